//! Biomego Core
//!
//! Value types shared by the engine and the module.
//!
//! This crate contains:
//! - Container descriptions: lazy, serializable requests for the engine
//! - Directory snapshots: immutable file trees and the diffs between them

pub mod domain;

pub use domain::changeset::Changeset;
pub use domain::container::{Container, ContainerOp, ExecRequest};
pub use domain::directory::{Directory, Snapshot};
