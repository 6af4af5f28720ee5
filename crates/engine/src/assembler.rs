//! Context assembly.
//!
//! Builds the "story so far" block that precedes a generation prompt from
//! two layers:
//!
//! 1. **Character profiles**: current traits of the (optionally filtered)
//!    cast, never trimmed.
//! 2. **Past events**: the `n` most similar memory snippets, best first.
//!
//! Assembly is read-only; it never writes to memory.

use std::sync::Arc;
use storyforge_memory::MemoryStore;
use storyforge_memory::profiles::render_traits;

/// Number of past events pulled into a prompt when not configured.
pub const DEFAULT_CONTEXT_RESULTS: usize = 3;

pub struct ContextAssembler {
    memory: Arc<MemoryStore>,
    n_results: usize,
}

impl ContextAssembler {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self {
            memory,
            n_results: DEFAULT_CONTEXT_RESULTS,
        }
    }

    pub fn with_results(mut self, n_results: usize) -> Self {
        self.n_results = n_results;
        self
    }

    pub fn n_results(&self) -> usize {
        self.n_results
    }

    /// Profile summary followed by the most relevant past events.
    ///
    /// Either layer may be empty; with both empty the result is `""`.
    pub async fn assemble(&self, prompt: &str, profiles_filter: Option<&str>) -> String {
        let mut context = self.memory.profiles_summary(profiles_filter).await;

        let events = self.memory.relevant_context(prompt, self.n_results).await;
        if !events.is_empty() {
            if !context.is_empty() {
                context.push('\n');
            }
            context.push_str("Relevant Past Events:\n");
            for event in &events {
                context.push_str(&format!("- {event}\n"));
            }
        }

        context
    }

    /// Delimited block naming an explicit cast.
    ///
    /// Every name is listed, including ones with no stored profile, so the
    /// model knows who is on stage.
    pub async fn assemble_for_characters(&self, query: &str, characters: &[String]) -> String {
        let mut context = String::from("--- CONTEXT ---\n");

        if !characters.is_empty() {
            context.push_str("CHARACTERS:\n");
            for name in characters {
                let traits = self
                    .memory
                    .get_profile(name)
                    .await
                    .map(|p| render_traits(&p.traits))
                    .unwrap_or_default();
                context.push_str(&format!("{name}: {traits}\n"));
            }
        }

        let events = self.memory.relevant_context(query, self.n_results).await;
        if !events.is_empty() {
            context.push_str("\nPAST EVENTS:\n");
            for event in &events {
                context.push_str(&format!("- {event}\n"));
            }
        }

        context.push_str("---------------\n");
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use storyforge_core::{ManualClock, Metadata};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::in_memory().with_clock(Arc::new(ManualClock::ticking())))
    }

    fn traits(role: &str) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([("role".to_string(), json!(role))])
    }

    #[tokio::test]
    async fn empty_memory_assembles_nothing() {
        let assembler = ContextAssembler::new(store());
        assert_eq!(assembler.assemble("anything", None).await, "");
    }

    #[tokio::test]
    async fn profiles_then_events() {
        let memory = store();
        memory.update_profile("Mira", traits("smuggler")).await;
        memory
            .add_event("Mira hid the map in the lighthouse.", Metadata::new())
            .await
            .unwrap();

        let context = ContextAssembler::new(memory)
            .assemble("Where is the map?", None)
            .await;
        assert_eq!(
            context,
            "Character Profiles:\n- Mira: role: smuggler\n\n\
             Relevant Past Events:\n- Mira hid the map in the lighthouse.\n"
        );
    }

    #[tokio::test]
    async fn events_only_and_bounded() {
        let memory = store();
        for text in ["one storm", "two storms", "three storms", "four storms"] {
            memory.add_event(text, Metadata::new()).await.unwrap();
        }

        let assembler = ContextAssembler::new(memory).with_results(2);
        let context = assembler.assemble("storms", None).await;
        assert!(context.starts_with("Relevant Past Events:\n"));
        assert_eq!(context.lines().filter(|l| l.starts_with("- ")).count(), 2);
    }

    #[tokio::test]
    async fn character_block_lists_unknown_names() {
        let memory = store();
        memory.update_profile("Orin", traits("captain")).await;
        memory
            .add_event("Orin sighted the reef at dawn.", Metadata::new())
            .await
            .unwrap();

        let context = ContextAssembler::new(memory)
            .assemble_for_characters("reef", &["Orin".to_string(), "Vale".to_string()])
            .await;
        assert_eq!(
            context,
            "--- CONTEXT ---\nCHARACTERS:\nOrin: role: captain\nVale: \n\n\
             PAST EVENTS:\n- Orin sighted the reef at dawn.\n---------------\n"
        );
    }
}
