//! Porcelain commands (user-facing operations)
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `add`: Stage files
//! - `rm`: Unstage files, leaving the workspace alone

pub mod add;
pub mod init;
pub mod rm;
