use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::user_devices::UserDeviceEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAdmission {
    /// Device already registered; only its last-active time moves.
    Known,
    /// New device fits under the limit.
    Added,
    LimitReached { max_devices: i32 },
}

/// Decides whether `device_id` may use the account given the devices already
/// registered. A known device is always admitted, even when the user sits at
/// (or above, after a plan downgrade) the limit.
pub fn admit_device(
    devices: &[UserDeviceEntity],
    device_id: &str,
    device_limit: i32,
) -> DeviceAdmission {
    if devices.iter().any(|device| device.device_id == device_id) {
        return DeviceAdmission::Known;
    }

    let registered = i32::try_from(devices.len()).unwrap_or(i32::MAX);
    if registered >= device_limit {
        return DeviceAdmission::LimitReached {
            max_devices: device_limit,
        };
    }

    DeviceAdmission::Added
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device_id: String,
    pub last_active: DateTime<Utc>,
}

impl From<UserDeviceEntity> for DeviceDto {
    fn from(value: UserDeviceEntity) -> Self {
        Self {
            device_id: value.device_id,
            last_active: value.last_active_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn devices(user_id: Uuid, ids: &[&str]) -> Vec<UserDeviceEntity> {
        ids.iter()
            .map(|id| UserDeviceEntity {
                user_id,
                device_id: id.to_string(),
                last_active_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn new_device_beyond_limit_is_rejected() {
        let registered = devices(Uuid::new_v4(), &["tv", "phone"]);

        assert_eq!(
            admit_device(&registered, "laptop", 2),
            DeviceAdmission::LimitReached { max_devices: 2 }
        );
    }

    #[test]
    fn known_device_is_admitted_at_the_limit() {
        let registered = devices(Uuid::new_v4(), &["tv", "phone"]);

        assert_eq!(admit_device(&registered, "phone", 2), DeviceAdmission::Known);
    }

    #[test]
    fn new_device_under_limit_is_added() {
        let registered = devices(Uuid::new_v4(), &["tv"]);

        assert_eq!(admit_device(&registered, "phone", 2), DeviceAdmission::Added);
        assert_eq!(admit_device(&[], "tv", 1), DeviceAdmission::Added);
    }
}
