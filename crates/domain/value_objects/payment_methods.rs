use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::payment_methods::PaymentMethodEntity;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDto {
    pub first6: Option<String>,
    pub last4: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
    pub card_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodDto {
    pub id: Uuid,
    pub payment_method_id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub title: Option<String>,
    pub card: Option<CardDto>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentMethodEntity> for PaymentMethodDto {
    fn from(value: PaymentMethodEntity) -> Self {
        let card = (value.card_last4.is_some() || value.card_first6.is_some()).then(|| CardDto {
            first6: value.card_first6,
            last4: value.card_last4,
            expiry_month: value.card_expiry_month,
            expiry_year: value.card_expiry_year,
            card_type: value.card_type,
        });

        Self {
            id: value.id,
            payment_method_id: value.provider_method_id,
            method_type: value.method_type,
            title: value.title,
            card,
            is_default: value.is_default,
            created_at: value.created_at,
        }
    }
}

/// Where the default slot goes once a method is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultAfterRemoval {
    /// The removed method was not the default.
    Unchanged,
    Promote {
        method_id: Uuid,
        provider_method_id: String,
    },
    /// Nothing left to charge; auto-renewal has to be switched off.
    NoneLeft,
}

/// The newest remaining method inherits the default.
pub fn default_after_removal(
    removed: &PaymentMethodEntity,
    remaining: &[PaymentMethodEntity],
) -> DefaultAfterRemoval {
    if !removed.is_default {
        return DefaultAfterRemoval::Unchanged;
    }

    remaining
        .iter()
        .filter(|method| method.id != removed.id)
        .max_by_key(|method| method.created_at)
        .map_or(DefaultAfterRemoval::NoneLeft, |method| {
            DefaultAfterRemoval::Promote {
                method_id: method.id,
                provider_method_id: method.provider_method_id.clone(),
            }
        })
}
