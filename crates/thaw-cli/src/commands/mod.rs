//! Built-in operations.

pub mod buckets;
pub mod delete;
pub mod fetch;
pub mod list;
pub mod objects;
pub mod restore;
pub mod verify;
