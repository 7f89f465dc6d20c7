pub mod chart_renderer;
pub mod holdings_service;
