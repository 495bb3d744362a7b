//! Turning retrieval results and history into generation inputs.

use kioku_core::{ChatMessage, ConversationTurn};

use crate::models::{ScoredResult, SourceAttribution};

/// Join ranked results into one context block.
///
/// Each document becomes `Title: ...` and `Content: ...` lines; documents are
/// separated by a blank line and keep their ranked order. Content is never
/// truncated here.
pub fn assemble_context(results: &[ScoredResult]) -> String {
    results
        .iter()
        .map(|result| {
            format!(
                "Title: {}\nContent: {}",
                result.document.title, result.document.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Flatten conversation turns into alternating chat messages, oldest first.
pub fn history_messages(history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2);
    for turn in history {
        if let Some(user) = &turn.user {
            messages.push(ChatMessage::user(user.clone()));
        }
        if let Some(assistant) = &turn.assistant {
            messages.push(ChatMessage::assistant(assistant.clone()));
        }
    }
    messages
}

/// Attribution list for a set of results with content previews.
pub fn attributions(results: &[ScoredResult], preview_chars: usize) -> Vec<SourceAttribution> {
    results
        .iter()
        .map(|result| SourceAttribution {
            title: result.document.title.clone(),
            content: preview(&result.document.content, preview_chars),
            source: result.document.source.clone(),
        })
        .collect()
}

fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Final user prompt sent to the generative model.
pub fn build_prompt(instructions: &str, context: &str, question: &str) -> String {
    format!("{instructions}\n\nContext:\n{context}\n\nUser question: {question}")
}
