use std::sync::Arc;

use kioku_knowledge::KnowledgeEngine;

use crate::chat::AnswerGenerator;

/// Shared application state handed to every request handler
pub struct AppState {
    engine: Arc<KnowledgeEngine>,
    answerer: AnswerGenerator,
}

impl AppState {
    pub fn new(engine: Arc<KnowledgeEngine>, answerer: AnswerGenerator) -> Self {
        Self { engine, answerer }
    }

    pub fn engine(&self) -> &KnowledgeEngine {
        &self.engine
    }

    pub fn answerer(&self) -> &AnswerGenerator {
        &self.answerer
    }
}
