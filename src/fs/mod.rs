//! Filesystem helpers shared by the state, plan and lock file writers.
pub mod atomic;
pub mod meta;

pub use atomic::write_atomic;
pub use meta::sha256_hex;
