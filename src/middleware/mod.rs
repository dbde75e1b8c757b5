/// Middleware functions related to CORS implementation
pub mod cors;
