//! docforge: a document processing server.
//!
//! Uploads are staged into an [`ephemeral_workspace::Workspace`], processed
//! by an external engine and served back through short-lived download links.
//! Everything written to disk is swept once its retention expires.

pub mod compression;
pub mod config;
pub mod engine;
pub mod errors;
pub mod web;
