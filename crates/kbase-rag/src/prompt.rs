//! Prompt templates and context assembly.

use kbase_inference::{ChatMessage as PromptMessage, ChatRole};
use kbase_postgres::model::ChatMessage as StoredMessage;
use kbase_postgres::types::MessageRole;

use crate::retriever::RetrievedSegment;

/// Fixed answer returned when the knowledge base holds nothing relevant.
pub const REFUSAL_TEMPLATE: &str =
    "No supporting content was found in the knowledge base for this question. \
     Please rephrase the question or confirm that the relevant documents have \
     been uploaded and that you have access to them.";

/// System prompt constraining the model to the provided context.
pub const RAG_SYSTEM_PROMPT: &str = "\
You are a knowledge-base assistant for enterprise documents. Answer the \
user's question using ONLY the reference content provided below. Every \
statement in your answer must be supported by the references; cite nothing \
from outside them. If the references do not contain the information needed \
to answer, reply exactly with: \"No supporting content was found in the \
knowledge base for this question.\" Keep answers concise and in the language \
of the question.";

/// System prompt for rewriting a follow-up into a self-contained query.
pub const REWRITE_SYSTEM_PROMPT: &str = "\
Rewrite the user's latest question into a single self-contained question, \
resolving pronouns and references against the conversation so far. Output \
only the rewritten question with no explanation. If the question is already \
self-contained, output it unchanged.";

/// Formats one retrieved segment with its source tag.
fn format_segment(segment: &RetrievedSegment) -> String {
    format!(
        "[{}, page {}]\n{}",
        segment.doc_name, segment.seg_page_idx, segment.content
    )
}

/// Concatenates retrieved segments in rank order under a character
/// budget.
///
/// The budget check runs before each append, so the first segment is
/// always included even when it alone exceeds the budget.
pub fn build_context(segments: &[RetrievedSegment], context_max_chars: usize) -> String {
    let mut context = String::new();

    for segment in segments {
        let formatted = format_segment(segment);
        if !context.is_empty()
            && context.chars().count() + formatted.chars().count() > context_max_chars
        {
            break;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&formatted);
    }

    context
}

/// Converts stored history into prompt messages.
pub fn history_messages(history: &[StoredMessage]) -> Vec<PromptMessage> {
    history
        .iter()
        .map(|message| PromptMessage {
            role: match message.message_type {
                MessageRole::Human => ChatRole::User,
                MessageRole::Ai => ChatRole::Assistant,
            },
            content: message.content.clone(),
        })
        .collect()
}

/// Builds the full RAG prompt: system + history + context-tagged question.
pub fn build_rag_messages(
    history: &[StoredMessage],
    context: &str,
    question: &str,
) -> Vec<PromptMessage> {
    let mut messages = vec![PromptMessage::system(RAG_SYSTEM_PROMPT)];
    messages.extend(history_messages(history));
    messages.push(PromptMessage::user(format!(
        "References:\n{context}\n\nQuestion: {question}"
    )));
    messages
}

/// Builds the query rewrite prompt.
pub fn build_rewrite_messages(
    history: &[StoredMessage],
    question: &str,
) -> Vec<PromptMessage> {
    let mut messages = vec![PromptMessage::system(REWRITE_SYSTEM_PROMPT)];
    messages.extend(history_messages(history));
    messages.push(PromptMessage::user(question.to_owned()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(doc: &str, page: i32, content: &str) -> RetrievedSegment {
        RetrievedSegment {
            doc_id: doc.to_owned(),
            doc_name: format!("{doc}.pdf"),
            seg_id: format!("{doc}-{page}-0-text"),
            seg_page_idx: page,
            rerank_score: 0.9,
            fused_score: 0.8,
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_context_is_tagged_and_ordered() {
        let segments = vec![
            segment("manual", 3, "first passage"),
            segment("handbook", 7, "second passage"),
        ];

        let context = build_context(&segments, 10_000);
        assert!(context.starts_with("[manual.pdf, page 3]"));
        let first = context.find("first passage").unwrap();
        let second = context.find("second passage").unwrap();
        assert!(first < second);
        assert!(context.contains("[handbook.pdf, page 7]"));
    }

    #[test]
    fn test_context_respects_budget() {
        let segments = vec![
            segment("a", 1, &"x".repeat(100)),
            segment("b", 1, &"y".repeat(100)),
            segment("c", 1, &"z".repeat(100)),
        ];

        let context = build_context(&segments, 150);
        assert!(context.contains("[a.pdf, page 1]"));
        assert!(!context.contains("[c.pdf, page 1]"));
    }

    #[test]
    fn test_first_segment_always_included() {
        let segments = vec![segment("a", 1, &"x".repeat(500))];
        let context = build_context(&segments, 10);
        assert!(context.contains("[a.pdf, page 1]"));
    }
}
