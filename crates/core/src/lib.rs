//! # StoryForge Core
//!
//! Domain types, traits, and error definitions for the StoryForge narrative
//! engine. This crate has **no network or storage code**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping provider transports and storage backends via configuration
//! - Easy testing with scripted backends and manual clocks
//! - Clean dependency graph (all crates depend inward on core)

pub mod clock;
pub mod error;
pub mod memory;
pub mod provider;
pub mod story;

// Re-export key types at crate root for ergonomics
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, GenerationError, MemoryError, ProviderError, Result};
pub use memory::{CharacterProfile, EventLog, MemoryEvent, Metadata};
pub use provider::{
    AttemptOutcome, Backend, GenerateOptions, GenerationResult, ImageBackend, ImagePayload,
    Payload, ProviderAttempt, ProviderKey, ProviderKind, TextBackend,
};
pub use story::{
    EmotionScore, NarrativeSegment, StoryToggles, StructuredStoryResult, ValidationReport,
    rank_emotions,
};
