//! Retrieval-augmented answer generation.

use std::sync::Arc;
use std::time::Duration;

use kioku_core::{ChatMessage, ConversationTurn, GenerationSettings};
use kioku_knowledge::context::{assemble_context, attributions, build_prompt, history_messages};
use kioku_knowledge::{KnowledgeEngine, KnowledgeError, KnowledgeSettings, SourceAttribution};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::providers::{Provider, ProviderError};

/// Knobs for one answer pipeline, resolved from configuration.
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub instructions: String,
    /// Documents retrieved as context
    pub max_results: usize,
    /// Attributions returned with the answer
    pub max_sources: usize,
    pub preview_chars: usize,
    /// Extra attempts after a retryable provider failure
    pub retries: u32,
    /// First backoff delay, doubled after each retry
    pub retry_backoff: Duration,
}

impl AnswerSettings {
    pub fn from_config(generation: &GenerationSettings, knowledge: &KnowledgeSettings) -> Self {
        Self {
            instructions: generation.instructions.clone(),
            max_results: knowledge.search.max_results,
            max_sources: knowledge.search.max_sources,
            preview_chars: knowledge.search.preview_chars,
            retries: generation.retries,
            retry_backoff: Duration::from_millis(generation.retry_backoff_ms),
        }
    }
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self::from_config(&GenerationSettings::default(), &KnowledgeSettings::default())
    }
}

/// Generated answer plus the documents it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub response: String,
    pub sources: Vec<SourceAttribution>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("generation failed: {0}")]
    Generation(#[from] ProviderError),
}

/// Retriever, context assembly, and a generative provider wired together.
///
/// Holds no per-conversation state; history arrives with every call.
#[derive(Clone)]
pub struct AnswerGenerator {
    engine: Arc<KnowledgeEngine>,
    provider: Arc<dyn Provider>,
    settings: AnswerSettings,
}

impl AnswerGenerator {
    pub fn new(
        engine: Arc<KnowledgeEngine>,
        provider: Arc<dyn Provider>,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            engine,
            provider,
            settings,
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub async fn answer(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatAnswer, ChatError> {
        let results = self
            .engine
            .retrieve(query, self.settings.max_results)
            .await?;
        debug!(hits = results.len(), "assembled answer context");

        let context = assemble_context(&results);
        let prompt = build_prompt(&self.settings.instructions, &context, query);
        let response = self
            .generate_with_backoff(history_messages(history), &prompt)
            .await?;

        let shown = results.len().min(self.settings.max_sources);
        Ok(ChatAnswer {
            response,
            sources: attributions(&results[..shown], self.settings.preview_chars),
        })
    }

    async fn generate_with_backoff(
        &self,
        history: Vec<ChatMessage>,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let mut delay = self.settings.retry_backoff;
        let mut attempt = 0;
        loop {
            match self
                .provider
                .send_conversation(None, history.clone(), prompt)
                .await
            {
                Ok(response) => return Ok(response.text),
                Err(err) if err.is_retryable() && attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        error = %err,
                        "retrying generation after {:?}",
                        delay
                    );
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use kioku_knowledge::{HashingEmbedder, MemoryDocumentStore, NewDocument};

    use super::*;
    use crate::providers::ProviderResponse;

    /// Replays scripted outcomes and records every prompt it receives.
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: Mutex<Vec<(Vec<ChatMessage>, String)>>,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn send_conversation(
            &self,
            _system: Option<&str>,
            history: Vec<ChatMessage>,
            new_message: &str,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((history, new_message.to_string()));
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::NoContent));
            outcome.map(|text| ProviderResponse {
                id: "resp-1".to_string(),
                model: "scripted-model".to_string(),
                text,
                usage: None,
                stop_reason: None,
            })
        }
    }

    fn unavailable() -> ProviderError {
        ProviderError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        }
    }

    fn engine() -> Arc<KnowledgeEngine> {
        Arc::new(KnowledgeEngine::with_components(
            KnowledgeSettings::default(),
            Arc::new(HashingEmbedder::new(256)),
            Arc::new(MemoryDocumentStore::new()),
        ))
    }

    fn settings() -> AnswerSettings {
        AnswerSettings {
            instructions: "Answer from the context.".to_string(),
            retry_backoff: Duration::from_millis(1),
            ..AnswerSettings::default()
        }
    }

    #[tokio::test]
    async fn test_prompt_and_history_reach_provider() {
        let engine = engine();
        engine
            .create(NewDocument::new("Cats", "Cats purr when content.").with_source("pets.txt"))
            .await
            .unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![Ok("They purr.".to_string())]));
        let generator = AnswerGenerator::new(engine, provider.clone(), settings());

        let history = vec![ConversationTurn::new("Hi", "Hello!")];
        let answer = generator.answer("Do cats purr?", &history).await.unwrap();

        assert_eq!(answer.response, "They purr.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source.as_deref(), Some("pets.txt"));

        let calls = provider.calls.lock().unwrap();
        let (sent_history, prompt) = &calls[0];
        assert_eq!(
            sent_history,
            &vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")]
        );
        insta::assert_snapshot!(prompt, @r"
Answer from the context.

Context:
Title: Cats
Content: Cats purr when content.

User question: Do cats purr?
");
    }

    #[tokio::test]
    async fn test_empty_store_still_answers() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("No idea.".to_string())]));
        let generator = AnswerGenerator::new(engine(), provider.clone(), settings());

        let answer = generator.answer("Anything?", &[]).await.unwrap();
        assert_eq!(answer.response, "No idea.");
        assert!(answer.sources.is_empty());

        let calls = provider.calls.lock().unwrap();
        assert!(calls[0].1.contains("Context:\n\n\nUser question: Anything?"));
    }

    #[tokio::test]
    async fn test_sources_are_capped() {
        let engine = engine();
        for i in 0..8 {
            engine
                .create(NewDocument::new(format!("Doc {i}"), format!("cats fact {i}")))
                .await
                .unwrap();
        }
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("ok".to_string())]));
        let generator = AnswerGenerator::new(
            engine,
            provider,
            AnswerSettings {
                max_results: 8,
                max_sources: 5,
                ..settings()
            },
        );

        let answer = generator.answer("cats", &[]).await.unwrap();
        assert_eq!(answer.sources.len(), 5);
    }

    #[tokio::test]
    async fn test_retries_retryable_errors() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Ok("finally".to_string()),
        ]));
        let generator = AnswerGenerator::new(engine(), provider.clone(), settings());

        let answer = generator.answer("cats", &[]).await.unwrap();
        assert_eq!(answer.response, "finally");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok("too late".to_string()),
        ]));
        let generator = AnswerGenerator::new(engine(), provider.clone(), settings());

        let err = generator.answer("cats", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Generation(ProviderError::ApiError { status: 503, .. })
        ));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::ApiError {
                status: 400,
                message: "bad request".to_string(),
            }),
            Ok("unused".to_string()),
        ]));
        let generator = AnswerGenerator::new(engine(), provider.clone(), settings());

        let err = generator.answer("cats", &[]).await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(_)));
        assert_eq!(provider.call_count(), 1);
    }
}
