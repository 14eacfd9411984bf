//! Core repository components
//!
//! This module contains the stateful building blocks of a repository:
//!
//! - `database`: Content-addressed object database of loose objects
//! - `index`: Staging area (index/cache) mapping paths to blob IDs
//! - `repository`: Context that owns one of each and composes commands
//! - `workspace`: Working directory file system operations

pub mod database;
pub mod index;
pub mod repository;
pub mod workspace;
