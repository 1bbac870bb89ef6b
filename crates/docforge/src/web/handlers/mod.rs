//! HTTP request handlers organized by operation

pub mod batch;
pub mod compress;
pub mod files;
pub mod health;
