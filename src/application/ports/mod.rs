pub mod catalog;
pub mod payment_gateway;
