pub mod admin;
pub mod auth;
pub mod channels;
pub mod playlist;
pub mod subscriptions;
pub mod users;
pub mod yookassa;
