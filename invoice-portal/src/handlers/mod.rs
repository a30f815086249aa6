pub mod admin;
pub mod app;
pub mod auth;
pub mod finance;
pub mod metrics;
pub mod vendor;
