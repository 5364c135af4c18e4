//! Root-scoped filesystem abstraction for depshift.
//!
//! This crate provides a synchronous `FileSystem` trait with two implementations:
//! a native one backed by `std::fs` and an in-memory one used by tests and by
//! callers that already hold file contents.
//!
//! # Example
//!
//! ```no_run
//! use depshift_fs::{FileSystem, NativeFileSystem};
//! use std::path::Path;
//!
//! # fn main() -> std::io::Result<()> {
//! let fs = NativeFileSystem::new(".")?;
//! let contents = fs.read_to_string(Path::new("package.json"))?;
//! println!("{}", contents);
//! # Ok(())
//! # }
//! ```

mod file_system;
pub mod memory;
pub mod native;

pub use file_system::{FileMetadata, FileSystem};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
