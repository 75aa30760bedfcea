pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod logs;
pub mod mapping;
pub mod remediation;
pub mod ui;
