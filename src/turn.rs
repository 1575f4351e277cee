use crate::consts::{APOLOGY_UTTERANCE, REPROMPT_UTTERANCE, SYSTEM_PROMPT};
use crate::generation::ConversationGenerator;
use crate::store::CallStore;
use crate::types::Speaker;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Sequences one caller exchange: append what was heard, ask the generator
/// for a reply under a time budget, append and return it.
pub struct TurnCoordinator {
    store: Arc<CallStore>,
    generator: Arc<dyn ConversationGenerator>,
    /// The caller is waiting on the line; a reply slower than this is
    /// treated as a failure to recover from, not awaited.
    budget: Duration,
}

impl TurnCoordinator {
    pub fn new(
        store: Arc<CallStore>,
        generator: Arc<dyn ConversationGenerator>,
        budget: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            budget,
        }
    }

    pub async fn next_utterance(&self, call_sid: &str, caller_text: &str) -> String {
        // An empty turn has no dialogue value; re-prompt without touching
        // the history or the generator.
        if caller_text.trim().is_empty() {
            debug!(call_sid=%call_sid, "empty caller utterance, re-prompting");
            return REPROMPT_UTTERANCE.to_string();
        }

        // The caller turn goes into the store before the generation call, so
        // history reflects what was heard even if we fail mid-generation.
        self.store.append_turn(call_sid, Speaker::Caller, caller_text);
        let history = self.store.turns(call_sid);
        debug!(call_sid=%call_sid, turns = history.len(), "requesting reply");

        match timeout(self.budget, self.generator.generate(SYSTEM_PROMPT, &history)).await {
            Ok(Ok(reply)) => {
                self.store.append_turn(call_sid, Speaker::Assistant, &reply);
                reply
            }
            Ok(Err(e)) => {
                // No assistant turn for the failure: a retried question gets
                // answered fresh instead of anchored to a phantom reply.
                error!(call_sid=%call_sid, error=%e, "generation failed");
                APOLOGY_UTTERANCE.to_string()
            }
            Err(_) => {
                warn!(call_sid=%call_sid, budget=?self.budget, "generation over time budget, abandoning");
                APOLOGY_UTTERANCE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Turn;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    struct ScriptedGenerator {
        reply: Result<String, ()>,
        delay: Duration,
        calls: AtomicU32,
        seen_history: Mutex<Vec<usize>>,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
                seen_history: Mutex::new(vec![]),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
                seen_history: Mutex::new(vec![]),
            }
        }

        fn slow(text: &str, delay: Duration) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay,
                calls: AtomicU32::new(0),
                seen_history: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl ConversationGenerator for ScriptedGenerator {
        async fn generate(&self, _system_prompt: &str, turns: &[Turn]) -> Result<String, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_history.lock().unwrap().push(turns.len());
            sleep(self.delay).await;
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(Error::Generation("provider error".to_string())),
            }
        }
    }

    const BUDGET: Duration = Duration::from_secs(5);

    fn coordinator(
        generator: Arc<ScriptedGenerator>,
    ) -> (Arc<CallStore>, TurnCoordinator) {
        let store = Arc::new(CallStore::new());
        store.create_if_absent("CA1", "+15551234567");
        let coordinator = TurnCoordinator::new(Arc::clone(&store), generator, BUDGET);
        (store, coordinator)
    }

    #[tokio::test]
    async fn appends_caller_and_assistant_pair() {
        let generator = Arc::new(ScriptedGenerator::replying("It's sunny."));
        let (store, coordinator) = coordinator(Arc::clone(&generator));

        let reply = coordinator.next_utterance("CA1", "What's the weather?").await;
        assert_eq!(reply, "It's sunny.");

        let turns = store.turns("CA1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, Speaker::Caller);
        assert_eq!(turns[0].text, "What's the weather?");
        assert_eq!(turns[1].speaker, Speaker::Assistant);
        assert_eq!(turns[1].text, "It's sunny.");

        // The generation request already contained the new caller turn.
        assert_eq!(*generator.seen_history.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn empty_utterance_reprompts_without_history_or_generator() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let (store, coordinator) = coordinator(Arc::clone(&generator));

        for text in ["", "   ", "\t\n"] {
            let reply = coordinator.next_utterance("CA1", text).await;
            assert_eq!(reply, REPROMPT_UTTERANCE);
        }
        assert!(store.turns("CA1").is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generator_failure_keeps_caller_turn_only() {
        let generator = Arc::new(ScriptedGenerator::failing());
        let (store, coordinator) = coordinator(generator);

        let reply = coordinator.next_utterance("CA1", "Hello?").await;
        assert_eq!(reply, APOLOGY_UTTERANCE);

        let turns = store.turns("CA1");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, Speaker::Caller);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_over_budget_is_abandoned() {
        let generator = Arc::new(ScriptedGenerator::slow(
            "too late",
            Duration::from_secs(30),
        ));
        let (store, coordinator) = coordinator(generator);

        let reply = coordinator.next_utterance("CA1", "Hello?").await;
        assert_eq!(reply, APOLOGY_UTTERANCE);

        let turns = store.turns("CA1");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, Speaker::Caller);
    }

    #[tokio::test]
    async fn turn_pairs_accumulate_in_call_order() {
        let generator = Arc::new(ScriptedGenerator::replying("ok"));
        let (store, coordinator) = coordinator(generator);

        coordinator.next_utterance("CA1", "first").await;
        coordinator.next_utterance("CA1", "").await;
        coordinator.next_utterance("CA1", "second").await;

        let turns = store.turns("CA1");
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "ok", "second", "ok"]);
    }
}
