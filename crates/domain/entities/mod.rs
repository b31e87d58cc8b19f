pub mod channels;
pub mod payment_methods;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod user_devices;
pub mod users;
