//! Seed selection and question extraction from `issue_comment.created`
//! webhook payloads.

use std::fmt;

use serde::Deserialize;

use crate::entity_key::{parse_reference, EntityKey, EntityRef};
use crate::error::ContextError;
use crate::github_types::GithubUser;

pub const GPT_COMMAND: &str = "/gpt";

#[derive(Debug, Clone, Deserialize)]
/// The subset of a comment webhook payload the engine reads.
pub struct CommentEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub issue: Option<PayloadEntity>,
    /// Present on `pull_request_review_comment` payloads.
    #[serde(default)]
    pub pull_request: Option<PayloadEntity>,
    pub comment: PayloadComment,
    pub repository: PayloadRepository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadEntity {
    pub number: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRepository {
    pub name: String,
    pub owner: PayloadOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadOwner {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What a comment must contain to be treated as a question.
pub enum QuestionTrigger {
    /// `@{app} ` anywhere in the body, case-insensitive.
    Mention(String),
    /// Body starts with the command, e.g. `/gpt`.
    Command(String),
}

impl QuestionTrigger {
    pub fn mention(app_slug: &str) -> Self {
        Self::Mention(app_slug.trim().trim_start_matches('@').to_string())
    }

    pub fn gpt_command() -> Self {
        Self::Command(GPT_COMMAND.to_string())
    }

    /// Strip the trigger from `body`. `None` when the body does not trigger.
    fn strip(&self, body: &str) -> Option<String> {
        match self {
            Self::Mention(slug) => strip_mentions(body, slug),
            Self::Command(command) => body
                .trim_start()
                .strip_prefix(command.as_str())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Why a comment event produced no question.
pub enum SkipReason {
    UnsupportedAction(String),
    NotTriggered,
    BotAuthor,
    EmptyQuestion,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedAction(action) => write!(f, "unsupported comment action '{action}'"),
            Self::NotTriggered => f.write_str("comment does not mention the app"),
            Self::BotAuthor => f.write_str("comment is from a bot"),
            Self::EmptyQuestion => f.write_str("comment is empty"),
        }
    }
}

/// Parse a webhook payload document.
pub fn parse_comment_event(raw: &str) -> Result<CommentEvent, ContextError> {
    serde_json::from_str(raw).map_err(|error| ContextError::InvalidPayload(error.to_string()))
}

/// Seed reference for a comment event: the issue's `html_url` when it parses,
/// otherwise repository owner/name plus the issue or pull request number.
pub fn seed_from_event_payload(event: &CommentEvent) -> Result<EntityRef, ContextError> {
    let entity = event
        .issue
        .as_ref()
        .or(event.pull_request.as_ref())
        .ok_or_else(|| {
            ContextError::InvalidPayload("payload carries neither issue nor pull_request".into())
        })?;

    if let Some(html_url) = entity.html_url.as_deref() {
        match parse_reference(html_url, None) {
            Ok(seed) if seed.number() == entity.number => return Ok(seed),
            Ok(seed) => {
                tracing::debug!(
                    url = %seed.url,
                    number = entity.number,
                    "html_url disagrees with payload number"
                );
            }
            Err(error) => {
                tracing::debug!(%error, "falling back to repository fields for seed");
            }
        }
    }

    let key = EntityKey::new(&event.repository.owner.login, &event.repository.name, entity.number)?;
    Ok(EntityRef::from_key(key))
}

/// The question asked by a comment event, or the reason it is skipped.
///
/// Checks run in order: action, trigger, bot author, empty remainder.
pub fn extract_question(
    event: &CommentEvent,
    trigger: &QuestionTrigger,
) -> Result<String, SkipReason> {
    if let Some(action) = event.action.as_deref() {
        if action != "created" {
            return Err(SkipReason::UnsupportedAction(action.to_string()));
        }
    }
    let body = event.comment.body.as_deref().unwrap_or_default();
    let question = trigger.strip(body).ok_or(SkipReason::NotTriggered)?;
    if event.comment.user.as_ref().is_some_and(GithubUser::is_bot) {
        return Err(SkipReason::BotAuthor);
    }
    let question = question.trim();
    if question.is_empty() {
        return Err(SkipReason::EmptyQuestion);
    }
    Ok(question.to_string())
}

fn strip_mentions(body: &str, slug: &str) -> Option<String> {
    if slug.is_empty() {
        return None;
    }
    let needle = format!("@{}", slug.to_ascii_lowercase());
    let lowered = body.to_ascii_lowercase();
    let mut stripped = String::with_capacity(body.len());
    let mut cursor = 0;
    let mut matched = false;
    while let Some(offset) = lowered[cursor..].find(&needle) {
        let start = cursor + offset;
        let end = start + needle.len();
        let followed_by_space = body[end..].starts_with(char::is_whitespace);
        stripped.push_str(&body[cursor..start]);
        if followed_by_space {
            matched = true;
            cursor = end + body[end..].chars().next().map_or(0, char::len_utf8);
        } else {
            stripped.push_str(&body[start..end]);
            cursor = end;
        }
    }
    stripped.push_str(&body[cursor..]);
    matched.then_some(stripped)
}
