//! Utility functions.

mod fs;

pub use fs::write_json_atomic;
