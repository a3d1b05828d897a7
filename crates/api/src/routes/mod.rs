mod alerts;
mod analysis;
mod health;

pub use alerts::alerts_router;
pub use analysis::analysis_router;
pub use health::health_router;
