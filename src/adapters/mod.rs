pub mod mock;
pub mod stripe;
