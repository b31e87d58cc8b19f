pub mod admin;
pub mod auth;
pub mod auto_renewal;
pub mod channels;
pub mod payment_gateway;
pub mod payments;
pub mod playlist;
pub mod settlement;
pub mod subscriptions;
pub mod users;
