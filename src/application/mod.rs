//! Pipeline orchestration and the boundaries it drives.

pub mod clients;
pub mod error;
pub mod jobs;
pub mod repos;
pub mod workspace;
