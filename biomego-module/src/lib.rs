//! Biomego
//!
//! A Biome toolchain module for a container-execution host.
//!
//! Every operation builds a `Container` description and, where a result is
//! needed, hands it to the injected `Engine`. The module keeps no state
//! between calls.
//!
//! # Example
//!
//! ```no_run
//! use biomego::{Biomego, ModuleConfig};
//! use biomego_core::Directory;
//! use biomego_engine::PodmanEngine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let module = Biomego::new(ModuleConfig::default(), Arc::new(PodmanEngine::new()));
//!
//!     let matches = module.grep_directory(Directory::host("."), "TODO").await?;
//!     print!("{}", matches);
//!     Ok(())
//! }
//! ```

pub mod config;
mod module;

pub use config::{DEFAULT_BASE_IMAGE, ModuleConfig};
pub use module::{Biomego, DEFAULT_FIX_FILTER, TOOL_IMAGE};
