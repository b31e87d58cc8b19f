pub mod channels;
pub mod devices;
pub mod payment_methods;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod users;

#[cfg(test)]
mod test_support;
