// src/extractors/mod.rs
pub mod definitions;
pub mod keywords;
pub mod normalize;
pub mod section;

// Re-export key extraction types for convenience
pub use definitions::{definitions_for, SectionId};
pub use normalize::normalize_text;
pub use section::SectionExtractor;
