use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{subscriptions::SubscriptionEntity, users::UserEntity},
    value_objects::{devices::DeviceDto, subscriptions::SubscriptionDto},
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterModel {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginModel {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileModel {
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub is_admin: bool,
    pub phone_number: Option<String>,
    pub subscription: Option<SubscriptionDto>,
    pub created_at: DateTime<Utc>,
}

impl UserDto {
    pub fn new(user: UserEntity, subscription: Option<SubscriptionEntity>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            is_admin: user.is_admin,
            phone_number: user.phone_number,
            subscription: subscription.map(SubscriptionDto::from),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub active_devices: Vec<DeviceDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUserDto {
    pub user: UserDto,
    /// Only present when the password was generated server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginDto {
    pub token: String,
    pub device_id: String,
    pub user: UserDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsDto {
    pub users: i64,
    pub active_subscriptions: i64,
    pub channels: i64,
    pub succeeded_payments: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserListDto {
    pub users: Vec<UserDto>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
