//! Postrider Storage - Database and file storage abstraction
//!
//! This crate provides the persistence layer for Postrider: the
//! PostgreSQL-backed repositories for messages, attachments, and
//! webhook events, in-memory equivalents for embedding and tests, and
//! the blob store for attachment content.

pub mod db;
pub mod file;
pub mod memory;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use file::{FileStorage, LocalStorage};
pub use models::*;
pub use repository::*;
