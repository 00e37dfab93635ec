//! Renders a resolved context into delimited text blocks for a language model.
//!
//! Every section is bracketed as
//! `=== {label} === {identifier} ===` ... `=== End {label} ===`, each line
//! followed by a blank line, so the consumer can rely on section boundaries.
//! Rendering is a pure function of its inputs.

use std::collections::HashSet;

use serde::Serialize;

use crate::code_links::LinkedFile;
use crate::comment_streamliner::{Comment, StreamlinedComments};
use crate::entity_key::EntityKey;
use crate::traversal::{LinkedEntity, ResolvedContext, SpecOrBodyMap};

pub const NO_BODY_PLACEHOLDER: &str = "No specification or body available";
pub const NO_DIFF_PLACEHOLDER: &str = "No diff available";

const SYSTEM_INSTRUCTIONS: &str = "You are assisting as a GitHub bot. Answer the user's question \
using the context below, which contains the current issue or pull request and every linked \
issue or pull request that could be resolved. The last comment in the current issue's \
conversation is the question being asked. Base the answer on the provided context; when it \
does not contain an answer, say so and reason from what is available.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// System and user messages for a chat-completion call.
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Render one block per distinct key found in `entities`, `spec_or_bodies`
/// and `streamlined`, plus `current` if absent from all three.
///
/// Key order is entity order, then spec keys, then conversation keys, each in
/// insertion order.
pub fn format_context(
    entities: &[LinkedEntity],
    spec_or_bodies: &SpecOrBodyMap,
    streamlined: &StreamlinedComments,
    current: &EntityKey,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let keys = entities
        .iter()
        .map(|entity| &entity.key)
        .chain(spec_or_bodies.keys())
        .chain(streamlined.keys())
        .chain(std::iter::once(current))
        .filter(|key| seen.insert(*key))
        .collect::<Vec<_>>();

    keys.into_iter()
        .map(|key| {
            let entity = entities.iter().find(|entity| &entity.key == key);
            render_entity_block(
                key,
                entity,
                spec_or_bodies.get(key).map(String::as_str),
                streamlined.get(key).map(Vec::as_slice).unwrap_or_default(),
                key == current,
            )
        })
        .collect()
}

/// One block per embedded source file.
pub fn format_linked_files(files: &[LinkedFile]) -> Vec<String> {
    files
        .iter()
        .map(|file| {
            let label = "Linked File";
            let identifier = format!("{}/{}/{}", file.link.owner, file.link.repo, file.link.path);
            let mut block = header(label, &identifier);
            block.push_str(&file.content);
            ensure_trailing_newline(&mut block);
            block.push_str(&footer(label));
            block
        })
        .collect()
}

/// Entity blocks followed by linked-file blocks.
pub fn format_resolved_context(resolved: &ResolvedContext) -> Vec<String> {
    let mut blocks = format_context(
        &resolved.entities,
        &resolved.spec_or_bodies,
        &resolved.streamlined_comments,
        &resolved.seed,
    );
    blocks.extend(format_linked_files(&resolved.linked_files));
    blocks
}

pub fn render_context(blocks: &[String]) -> String {
    blocks.concat()
}

pub fn build_chat_prompt(question: &str, blocks: &[String]) -> ChatPrompt {
    ChatPrompt {
        system: format!("{SYSTEM_INSTRUCTIONS}\n\nContext:\n{}", blocks.join("\n")),
        user: question.trim().to_string(),
    }
}

fn render_entity_block(
    key: &EntityKey,
    entity: Option<&LinkedEntity>,
    spec_or_body: Option<&str>,
    comments: &[Comment],
    is_current: bool,
) -> String {
    let scope = if is_current { "Current" } else { "Linked" };
    let number = key.number();
    let is_pull_request = entity.is_some_and(|entity| entity.is_pull_request);

    let spec_label = if is_pull_request {
        format!("{scope} Pull #{number} Request")
    } else {
        format!("{scope} Issue #{number} Specification")
    };
    let body = spec_or_body
        .or_else(|| entity.and_then(|entity| entity.body.as_deref()))
        .filter(|body| !body.trim().is_empty())
        .unwrap_or(NO_BODY_PLACEHOLDER);

    let mut block = header(&spec_label, &key.to_string());
    block.push_str(body);
    block.push('\n');
    block.push_str(&footer(&spec_label));

    let display = key.display_label();
    let conversation_label = format!("{scope} Issue #{number} Conversation");
    block.push_str(&header(&conversation_label, &display));
    block.push_str(&render_conversation(comments));
    block.push_str(&footer(&conversation_label));

    if is_pull_request {
        let diff_label = format!("{scope} Pull Request Code Diff");
        block.push_str(&header(&diff_label, &display));
        match entity.and_then(|entity| entity.diff.as_deref()) {
            Some(diff) => {
                block.push_str(diff);
                ensure_trailing_newline(&mut block);
            }
            None => {
                block.push_str(NO_DIFF_PLACEHOLDER);
                block.push('\n');
            }
        }
        block.push_str(&footer(&diff_label));
    }
    block
}

fn render_conversation(comments: &[Comment]) -> String {
    let mut seen = HashSet::new();
    comments
        .iter()
        .filter(|comment| seen.insert(comment.id))
        .map(|comment| format!("{} {}: {}\n", comment.id, comment.author_login, comment.body))
        .collect()
}

fn header(label: &str, identifier: &str) -> String {
    format!("=== {label} === {identifier} ===\n\n")
}

fn footer(label: &str) -> String {
    format!("=== End {label} ===\n\n")
}

fn ensure_trailing_newline(text: &mut String) {
    if !text.ends_with('\n') {
        text.push('\n');
    }
}
