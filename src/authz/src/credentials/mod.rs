//! Credentials module
//!
//! [`CredentialsCache`] memoizes role sets and identity reaches for the
//! lifetime of one operation. [`SharedRoleCache`] is the opt-in long-lived
//! layer behind it, which callers must evict on every role mutation.

mod cache;
mod shared;

pub use cache::CredentialsCache;
pub use shared::{CacheStats, SharedCacheConfig, SharedRoleCache};
