#![doc = "The `taskgate` library crate."]
#![doc = ""]
#![doc = "A task-management API guarded by two gates: per-client admission control on every"]
#![doc = "request, then stateless session validation on protected routes. Users and tasks are"]
#![doc = "read through a TTL cache that sits in front of the persistent store."]
#![doc = "The binary (`main.rs`) wires these pieces together and runs the server."]

pub mod admission;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod housekeeping;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::error::AppError;
pub use crate::state::AppState;
