pub mod traits;

// API provider implementations
pub mod metals_dev;
