//! Renderers for the compiled token set.

pub mod css;
pub mod docs;

pub use css::{CssOutput, emit_css};
pub use docs::emit_docs;
