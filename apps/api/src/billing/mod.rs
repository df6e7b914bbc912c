pub mod checkout;
pub mod handlers;
pub mod signature;
