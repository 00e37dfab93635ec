//! Linked-context resolution for GitHub issue and pull request questions.
//! Starting from a seed entity this crate discovers transitively linked
//! issues and pull requests through an [`EntitySource`], merges their
//! conversations and renders them into delimited context blocks.

pub mod code_links;
pub mod comment_streamliner;
pub mod context_format;
pub mod entity_fetcher;
pub mod entity_key;
pub mod entity_source;
pub mod error;
pub mod github_types;
pub mod reference_extractor;
pub mod seed;
pub mod throttle;
pub mod traversal;

#[cfg(test)]
mod test_support;

pub use context_format::{
    build_chat_prompt, format_context, format_resolved_context, render_context, ChatPrompt,
};
pub use entity_key::{normalize_key, parse_reference, EntityKey, EntityRef};
pub use entity_source::EntitySource;
pub use error::ContextError;
pub use seed::{extract_question, parse_comment_event, seed_from_event_payload, QuestionTrigger};
pub use traversal::{resolve_context, ResolvedContext, TraversalConfig};
