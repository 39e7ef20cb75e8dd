pub mod content_service;
pub mod session_service;
pub mod user_service;
