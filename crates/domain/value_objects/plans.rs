use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::plans::{InsertPlanEntity, PlanEntity};

pub const DEFAULT_CURRENCY: &str = "RUB";

/// Catalogue seeded into an empty `plans` table.
pub fn default_plans() -> Vec<InsertPlanEntity> {
    vec![
        InsertPlanEntity {
            name: "Базовый".to_string(),
            description: "Доступ ко всем каналам на 1 устройстве".to_string(),
            month_duration: 1,
            price_minor: 299_00,
            discount_percent: 0,
            device_limit: 1,
            is_popular: false,
            sort_order: 1,
        },
        InsertPlanEntity {
            name: "Стандартный".to_string(),
            description: "Доступ ко всем каналам на 2 устройствах".to_string(),
            month_duration: 3,
            price_minor: 999_00,
            discount_percent: 15,
            device_limit: 2,
            is_popular: true,
            sort_order: 2,
        },
        InsertPlanEntity {
            name: "Премиум".to_string(),
            description: "Доступ ко всем каналам на 5 устройствах".to_string(),
            month_duration: 12,
            price_minor: 2999_00,
            discount_percent: 25,
            device_limit: 5,
            is_popular: false,
            sort_order: 3,
        },
    ]
}

/// Gateway amount string, e.g. `29900` -> `"299.00"`.
pub fn format_amount(amount_minor: i32) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Inverse of [`format_amount`]; accepts `"299"`, `"299.5"` and `"299.00"`.
pub fn parse_amount(value: &str) -> Option<i32> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, "0"),
    };
    if fraction.is_empty() || fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i32 = whole.parse().ok()?;
    let mut fraction_minor: i32 = fraction.parse().ok()?;
    if fraction.len() == 1 {
        fraction_minor *= 10;
    }
    whole.checked_mul(100)?.checked_add(fraction_minor)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDto {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub month_duration: i32,
    pub price: String,
    pub discount: i32,
    pub device_limit: i32,
    pub is_popular: bool,
    pub sort_order: i32,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            month_duration: value.month_duration,
            price: format_amount(value.price_minor),
            discount: value.discount_percent,
            device_limit: value.device_limit,
            is_popular: value.is_popular,
            sort_order: value.sort_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_kopecks_with_two_decimals() {
        assert_eq!(format_amount(299_00), "299.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(1_050), "10.50");
    }

    #[test]
    fn parses_gateway_amounts() {
        assert_eq!(parse_amount("299.00"), Some(299_00));
        assert_eq!(parse_amount("10.5"), Some(1_050));
        assert_eq!(parse_amount("7"), Some(700));
        assert_eq!(parse_amount("1.234"), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn default_catalogue_marks_standard_as_popular() {
        let plans = default_plans();

        assert_eq!(plans.len(), 3);
        let popular: Vec<_> = plans.iter().filter(|plan| plan.is_popular).collect();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].month_duration, 3);
        assert!(plans.iter().all(|plan| (0..=100).contains(&plan.discount_percent)));
    }
}
