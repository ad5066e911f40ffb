//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the create DTO used for inserts.

pub mod node;

pub use node::{NewNode, StoryNode};
