pub mod auth;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod server;
pub mod upload;
