//! Provider dependency lock file: version and checksum pins per provider.
pub mod locks;
pub mod parse;
pub mod store;
pub mod write;

pub use locks::{Hash, Locks, ProviderLock, Version};
pub use parse::parse_locks;
pub use store::{DependencyLockStore, ProviderOverrides};
pub use write::render_locks;
