pub mod holding;
pub mod metal;
pub mod period;
pub mod price;
pub mod settings;
