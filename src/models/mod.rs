//! Core data models for the drive metadata engine.
//!
//! Folders and files map to SQLite rows via `sqlx::FromRow` and serialize
//! as camelCase JSON via `serde`. Object bytes never pass through here; an
//! upload session only carries the signed URLs the client needs.

pub mod file;
pub mod folder;
pub mod upload;
