//! Library crate for subscan-rs exposing reusable modules.
pub mod config;
pub mod controller;
pub mod domain;
pub mod enumerate;
pub mod error;
pub mod export;
pub mod probe;
pub mod scanner;
pub mod server;
pub mod store;
pub mod types;
