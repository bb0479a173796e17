pub mod auth;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod http;
pub mod hub;
