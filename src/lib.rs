pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod permission;
pub mod reporting;
pub mod sanitize;
pub mod schema;
pub mod statistics;
pub mod store;
pub mod submission;
pub mod types;
