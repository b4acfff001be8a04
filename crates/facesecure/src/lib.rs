pub mod app_state;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod handlers;
pub mod models;
pub mod recognizer;
pub mod server;
pub mod sessions;
pub mod webhook;
