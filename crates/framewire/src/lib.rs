//! Top-level facade crate for framewire.
//!
//! Re-exports core types and the embed library so users can depend on a single crate.

pub mod core {
    pub use framewire_core::*;
}

pub mod embed {
    pub use framewire_embed::*;
}
