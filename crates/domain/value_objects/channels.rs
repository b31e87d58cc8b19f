use serde::{Deserialize, Serialize};

use crate::domain::entities::channels::ChannelEntity;

pub const DEFAULT_CATEGORY: &str = "Общие";
pub const DEFAULT_LANGUAGE: &str = "Русский";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelModel {
    pub name: String,
    pub stream_url: String,
    pub logo_url: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChannelModel {
    pub name: Option<String>,
    pub stream_url: Option<String>,
    pub logo_url: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistDto {
    pub channels: Vec<ChannelEntity>,
    pub categories: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRefreshDto {
    pub imported: usize,
    pub categories: usize,
}
