//! Provider transports and fallback orchestration for StoryForge.
//!
//! All transports implement `storyforge_core::Backend`. The
//! [`FallbackOrchestrator`] walks families, keys and models in order and
//! returns the first acceptable payload.

pub mod builder;
pub mod fallback;
pub mod gemini;
pub mod http;
pub mod keys;
pub mod openai_compat;
pub mod refusal;
pub mod registry;
pub mod shuffle;
pub mod stability;

pub use builder::{
    build_image_orchestrator, build_image_orchestrator_with, build_text_orchestrator,
    build_text_orchestrator_with,
};
pub use fallback::{FallbackOrchestrator, ImageOrchestrator, ProviderFamily, TextOrchestrator};
pub use gemini::{GeminiBackend, ImagenBackend};
pub use keys::KeyPool;
pub use openai_compat::{OpenAiCompatBackend, OpenAiImageBackend};
pub use refusal::RefusalDetector;
pub use registry::ClientRegistry;
pub use shuffle::{FixedOrder, KeyShuffle, RandomShuffle, SeededShuffle};
pub use stability::StabilityBackend;
