//! # rowguard-policy
//!
//! Access control for schema-driven tables.
//!
//! Every data operation is wrapped by two stages:
//!
//! 1. **before** - the table gate. The caller must be allowed to read (or
//!    write) the table as a whole, judged by the table's ownership record.
//!    A denial fails the whole operation with [`PolicyError::Unauthorized`].
//! 2. **after** - the row filter. Each returned row is judged by its own
//!    owner/group/world permission; rows the caller may not see are dropped
//!    silently.
//!
//! Administrator status is resolved through a cluster-wide
//! [`PermissionCache`] with store-if-absent writes.

pub mod admin;
pub mod cache;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod names;
pub mod resolver;
pub mod resource;
pub mod store;

pub use admin::{ADMIN_SET_KEY, AdminResolver, admin_flag_key};
pub use cache::{CacheError, CacheValue, MemoryCache, PermissionCache};
pub use context::{OwningGroups, RequestContext};
pub use error::PolicyError;
pub use interceptor::{AccessPipeline, Interceptor, ObjectAccessChecker, TableAccessChecker};
pub use names::{group_names_to_ids, relation_names_to_ids};
pub use resolver::PermissionResolver;
pub use resource::TableResource;
pub use store::{OwnershipRecord, PermissionStore};
