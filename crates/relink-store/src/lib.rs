//! Relink Store
//!
//! Entity Store Adapter interface consumed by the engine:
//! - [`EntityStore`]: `create` / `get` / `query` / `update` over collections
//! - [`Filter`]: conjunctive field conditions for `query`
//! - [`MemoryStore`]: in-process adapter with the same contract
//! - [`typed`]: record-level encode/decode helpers

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod adapter;
mod filter;
mod memory;
pub mod typed;

pub use adapter::{Collection, Document, EntityStore, Patch, StoreError};
pub use filter::{Condition, Filter};
pub use memory::MemoryStore;
