pub mod auth_handler;
pub mod courses;
pub mod health;
pub mod lessons;
pub mod metrics;
pub mod response;
pub mod sections;
pub mod users;

pub use health::health_check;
pub use metrics::metrics_handler;
