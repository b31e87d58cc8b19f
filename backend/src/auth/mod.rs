use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use crates::domain::{
    entities::{subscriptions::SubscriptionEntity, users::UserEntity},
    repositories::{
        devices::DeviceRepository, subscriptions::SubscriptionRepository, users::UserRepository,
    },
    value_objects::devices::{DeviceAdmission, admit_device},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub device_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Everything the extractors need; installed as a request extension by the
/// HTTP server.
pub struct AuthState {
    pub jwt_secret: String,
    pub users: Arc<dyn UserRepository + Send + Sync>,
    pub devices: Arc<dyn DeviceRepository + Send + Sync>,
    pub subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
}

pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    device_id: &str,
    expires_in_secs: i64,
) -> anyhow::Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        device_id: device_id.to_string(),
        iat: now,
        exp: now + expires_in_secs,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Токен не предоставлен"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::unauthorized("Пожалуйста, авторизуйтесь"))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Пожалуйста, авторизуйтесь"))
}

fn auth_state(parts: &Parts) -> Result<Arc<AuthState>, AppError> {
    parts
        .extensions
        .get::<Arc<AuthState>>()
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("auth state is not installed")))
}

/// A caller with a valid token whose account still exists.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub device_id: String,
    pub user: UserEntity,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = auth_state(parts)?;
        let token = bearer_token(parts)?;

        let claims = validate_token(&state.jwt_secret, token).map_err(|err| {
            warn!(error = %err, "auth: rejected bearer token");
            AppError::unauthorized("Пожалуйста, авторизуйтесь")
        })?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthorized("Пожалуйста, авторизуйтесь"))?;

        let user = state
            .users
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "auth: failed to load user");
                AppError::Internal(err)
            })?
            .ok_or_else(|| AppError::unauthorized("Пользователь не найден"))?;

        Ok(AuthUser {
            user_id,
            device_id: claims.device_id,
            user,
        })
    }
}

/// An authenticated caller with a running subscription whose device fits
/// under the subscription's device limit.
#[derive(Debug, Clone)]
pub struct SubscribedUser {
    pub user_id: Uuid,
    pub device_id: String,
    pub subscription: SubscriptionEntity,
}

#[async_trait]
impl<S> FromRequestParts<S> for SubscribedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let state = auth_state(parts)?;
        let now = Utc::now();
        let user_id = auth.user_id;

        let subscription = state
            .subscriptions
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "auth: failed to load subscription");
                AppError::Internal(err)
            })?
            .filter(|subscription| subscription.is_current(now))
            .ok_or_else(|| AppError::forbidden("Подписка истекла"))?;

        let devices = state.devices.list_devices(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "auth: failed to list devices");
            AppError::Internal(err)
        })?;

        match admit_device(&devices, &auth.device_id, subscription.device_limit) {
            DeviceAdmission::Known => {
                state
                    .devices
                    .touch_device(user_id, auth.device_id.clone(), now)
                    .await
                    .map_err(AppError::Internal)?;
            }
            DeviceAdmission::Added => {
                let added = state
                    .devices
                    .add_device_within_limit(
                        user_id,
                        auth.device_id.clone(),
                        subscription.device_limit,
                        now,
                    )
                    .await
                    .map_err(AppError::Internal)?;
                if !added {
                    warn!(%user_id, "auth: device limit reached by a concurrent login");
                    return Err(AppError::DeviceLimitReached {
                        max_devices: subscription.device_limit,
                    });
                }
            }
            DeviceAdmission::LimitReached { max_devices } => {
                warn!(%user_id, max_devices, "auth: device limit reached");
                return Err(AppError::DeviceLimitReached { max_devices });
            }
        }

        Ok(SubscribedUser {
            user_id,
            device_id: auth.device_id,
            subscription,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        if !auth.user.is_admin {
            warn!(user_id = %auth.user_id, "auth: admin route refused");
            return Err(AppError::forbidden(
                "Доступ запрещен. Требуются права администратора",
            ));
        }

        Ok(AdminUser {
            user_id: auth.user_id,
        })
    }
}
