//! Read-through access to users and tasks.
//!
//! Reads consult the shared [`EntityCache`](crate::cache::EntityCache) first and populate it
//! on a miss. Writes go to the store first and then invalidate every cache key the
//! entity is reachable under, so a read after a write never sees the pre-write snapshot.
//! A read that raced the write may still repopulate an older snapshot; that window is
//! bounded by the cache TTL.

pub mod task;
pub mod user;

pub use task::TaskRepository;
pub use user::UserRepository;
