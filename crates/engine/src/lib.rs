//! Narrative engine for StoryForge.
//!
//! Turns a user instruction into a [`NarrativeSegment`]: memory-backed
//! context assembly, one structured provider call, forgiving extraction
//! and optional illustration.
//!
//! [`NarrativeSegment`]: storyforge_core::NarrativeSegment

pub mod assembler;
pub mod engine;
pub mod extractor;
pub mod prompts;

pub use assembler::{ContextAssembler, DEFAULT_CONTEXT_RESULTS};
pub use engine::{DEFAULT_ARC_THRESHOLD, NarrativeEngine, VisualResult};
pub use extractor::{extract, extract_sentiment, extract_validation};
