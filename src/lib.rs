//! A runtime service-resolution engine for Rust.
//!
//! `polaris_di` re-exports [`polaris_container`], which resolves services from
//! a registry of declarations with transient, scoped and singleton lifetimes.
//!

pub use polaris_container::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use polaris_container::prelude::*;
}
