//! Leaf data types shared by the HDL engine and its hosts.
//!
//! A dependency is declared either statically on a type (see
//! [`Declaration`]) or at runtime as a [`ProviderEntity`]. Both carry an
//! [`EntityKind`] tag that the engine uses to route entities to the loader
//! phase that understands them.

pub mod coordinates;
pub mod entity;
pub mod hash;

// Re-exports
pub use coordinates::*;
pub use entity::*;
pub use hash::*;
