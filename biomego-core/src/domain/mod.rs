//! Core domain types
//!
//! Nothing here performs container work. A `Container` only records what the
//! engine should do once someone asks for its output.

pub mod changeset;
pub mod container;
pub mod directory;
