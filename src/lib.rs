pub mod api;
pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod notice;
pub mod storage;
pub mod types;
