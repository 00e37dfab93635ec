//! Normalizes issue and review comments into one per-entity conversation
//! shape, then merges and dedupes those conversations across repeated
//! discovery of the same entity.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::entity_key::EntityKey;
use crate::github_types::{AuthorType, RawComment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A human-authored comment with its owning entity resolved.
pub struct Comment {
    pub id: u64,
    pub author_login: String,
    pub author_type: AuthorType,
    pub body: String,
    pub owner_key: EntityKey,
}

/// Conversation per entity in first-seen key order, each list in upstream
/// chronological order.
pub type StreamlinedComments = IndexMap<EntityKey, Vec<Comment>>;

/// Normalize one upstream comment, keyed by the REST url it points back to.
/// Bot authors, missing users, blank bodies and comments whose owner url
/// cannot be keyed yield `None`.
pub fn normalize_comment(raw: &RawComment) -> Option<Comment> {
    match EntityKey::from_rest_url(raw.owner_url()) {
        Ok(owner_key) => normalize_comment_for(raw, &owner_key),
        Err(error) => {
            tracing::debug!(comment_id = raw.id(), %error, "comment owner url is not an entity");
            None
        }
    }
}

/// Normalize a comment that was listed for `owner_key`.
///
/// The listing key wins over the comment's own url, which still names the
/// old repository after a rename or transfer.
pub fn normalize_comment_for(raw: &RawComment, owner_key: &EntityKey) -> Option<Comment> {
    let user = raw.user()?;
    if user.is_bot() {
        return None;
    }
    let body = raw.body().filter(|body| !body.trim().is_empty())?;
    Some(Comment {
        id: raw.id(),
        author_login: user.login.clone(),
        author_type: user.author_type,
        body: body.to_string(),
        owner_key: owner_key.clone(),
    })
}

/// Group normalized comments by owning entity.
pub fn streamline(raw_comments: &[RawComment]) -> StreamlinedComments {
    group(raw_comments.iter().filter_map(normalize_comment))
}

/// Streamline the comments listed for one entity.
pub fn streamline_for(owner_key: &EntityKey, raw_comments: &[RawComment]) -> StreamlinedComments {
    let mut streamlined = group(
        raw_comments
            .iter()
            .filter_map(|raw| normalize_comment_for(raw, owner_key)),
    );
    streamlined.entry(owner_key.clone()).or_default();
    streamlined
}

fn group(comments: impl Iterator<Item = Comment>) -> StreamlinedComments {
    let mut streamlined = StreamlinedComments::new();
    for comment in comments {
        streamlined
            .entry(comment.owner_key.clone())
            .or_default()
            .push(comment);
    }
    streamlined
}

/// Append every incoming list to the existing list for the same key.
pub fn merge(
    mut existing: StreamlinedComments,
    incoming: StreamlinedComments,
) -> StreamlinedComments {
    merge_into(&mut existing, incoming);
    existing
}

pub fn merge_into(existing: &mut StreamlinedComments, incoming: StreamlinedComments) {
    for (key, comments) in incoming {
        existing.entry(key).or_default().extend(comments);
    }
}

/// Keep the first comment for each `(author, body)` pair per key.
pub fn dedupe(mut streamlined: StreamlinedComments) -> StreamlinedComments {
    dedupe_in_place(&mut streamlined);
    streamlined
}

pub fn dedupe_in_place(streamlined: &mut StreamlinedComments) {
    for comments in streamlined.values_mut() {
        let mut seen = HashSet::new();
        comments.retain(|comment| {
            seen.insert((comment.author_login.clone(), comment.body.clone()))
        });
    }
}
