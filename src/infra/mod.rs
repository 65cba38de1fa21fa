//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod ffmpeg;
pub mod http;
pub mod memory;
pub mod services;
pub mod telemetry;
