pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod report;
pub mod service;
pub mod storage;
