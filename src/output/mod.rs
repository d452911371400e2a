//! Serializers for render trees: structured document, indented text, and
//! self-contained flamegraph HTML.

pub mod document;
pub mod flamegraph;
pub mod text;
