//! Modgate — image moderation gateway.
//!
//! Accepts image uploads over HTTP, runs them through a pretrained NSFW
//! classifier and returns a structured verdict, gated by bearer-token
//! authentication with an admin tier for token management.

pub mod analyzer;
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub auth: auth::AuthService,
    pub analyzer: analyzer::ImageAnalyzer,
    pub config: config::Config,
}
