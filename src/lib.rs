pub mod auth;
pub mod catalog;
pub mod category;
pub mod config;
pub mod dashboard;
pub mod deploy;
pub mod message;
pub mod progress;
pub mod storage;
pub mod upload;
