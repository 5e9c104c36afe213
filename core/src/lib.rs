pub mod activity;
pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod lock;
pub mod manifest;
pub mod memory;
pub mod project;
pub mod security;
pub mod sync;
pub mod types;
pub mod user;
pub mod utils;
pub mod version;
