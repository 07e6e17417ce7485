pub mod api;
pub mod config;
pub mod engine;
pub mod service;
pub mod store;
pub mod ws;
