pub mod task;
pub mod user;

use std::fmt;

pub use task::{Task, TaskInput, TaskQuery, TaskStatus, TaskUpdate, MAX_PAGE};
pub use user::{AuthProvider, NewUser, User, UserAlias};

/// A stored or submitted label that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}
