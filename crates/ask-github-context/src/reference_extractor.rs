//! Cross-reference scanning over issue bodies and comments.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::entity_key::{EntityKey, EntityRef, OWNER_PATTERN, REPO_PATTERN};

static LINE_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#L\d+(?:C\d+)?(?:-L\d+(?:C\d+)?)?").expect("line anchor pattern compiles")
});

static HTML_URL_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)https?://(?:www\.)?github\.com/({OWNER_PATTERN})/({REPO_PATTERN})/(pulls?|issues?)/(\d+)"
    ))
    .expect("html scan pattern compiles")
});

static API_URL_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)https?://api\.github\.com/repos/({OWNER_PATTERN})/({REPO_PATTERN})/(pulls|issues)/(\d+)"
    ))
    .expect("api scan pattern compiles")
});

static CROSS_REPO_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:^|[\s(\[,;:])({OWNER_PATTERN})/({REPO_PATTERN})#(\d+)\b"
    ))
    .expect("cross repo scan pattern compiles")
});

static HASH_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(\[,;:])#(\d+)\b").expect("hash scan pattern compiles")
});

#[derive(Debug, Clone, Copy)]
/// Where a scanned text lives and which references may be followed from it.
pub struct ExtractionScope<'a> {
    /// Repository that `#N` shorthand resolves against.
    pub default_owner: &'a str,
    pub default_repo: &'a str,
    /// Owner of the traversal seed, used by the same-owner policy.
    pub origin_owner: &'a str,
    pub same_owner_only: bool,
    pub follow_hash_references: bool,
}

impl<'a> ExtractionScope<'a> {
    pub fn for_key(key: &'a EntityKey, origin_owner: &'a str) -> Self {
        Self {
            default_owner: key.owner(),
            default_repo: key.repo(),
            origin_owner,
            same_owner_only: true,
            follow_hash_references: true,
        }
    }
}

/// Replace `#L10-L20` style anchors so they never read as references.
pub fn strip_line_anchors(text: &str) -> String {
    LINE_ANCHOR_RE.replace_all(text, "").into_owned()
}

/// Extract entity references from `text` in order of appearance.
///
/// Returns an empty vector when nothing matches. Duplicate keys keep their
/// first occurrence. With `same_owner_only`, references owned by anyone other
/// than `origin_owner` are discarded and logged.
pub fn extract_references(text: &str, scope: &ExtractionScope<'_>) -> Vec<EntityRef> {
    let text = strip_line_anchors(text);
    let mut found: Vec<(usize, EntityRef)> = Vec::new();

    for captures in HTML_URL_SCAN_RE.captures_iter(&text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if let Some(key) = key_from_parts(&captures[1], &captures[2], &captures[4]) {
            found.push((whole.start(), EntityRef::new(key, whole.as_str())));
        }
    }
    for captures in API_URL_SCAN_RE.captures_iter(&text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if let Some(key) = key_from_parts(&captures[1], &captures[2], &captures[4]) {
            found.push((whole.start(), EntityRef::new(key, whole.as_str())));
        }
    }
    for captures in CROSS_REPO_SCAN_RE.captures_iter(&text) {
        let Some(owner) = captures.get(1) else {
            continue;
        };
        if let Some(key) = key_from_parts(owner.as_str(), &captures[2], &captures[3]) {
            found.push((owner.start(), EntityRef::from_key(key)));
        }
    }
    if scope.follow_hash_references {
        for captures in HASH_SCAN_RE.captures_iter(&text) {
            let Some(number) = captures.get(1) else {
                continue;
            };
            if let Some(key) =
                key_from_parts(scope.default_owner, scope.default_repo, number.as_str())
            {
                found.push((number.start(), EntityRef::from_key(key)));
            }
        }
    }

    found.sort_by_key(|(position, _)| *position);

    let origin_owner = scope.origin_owner.to_ascii_lowercase();
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for (_, entity_ref) in found {
        if scope.same_owner_only && entity_ref.owner() != origin_owner {
            tracing::info!(
                reference = %entity_ref.key,
                origin_owner = %origin_owner,
                "skipping reference outside the origin owner"
            );
            continue;
        }
        if seen.insert(entity_ref.key.clone()) {
            refs.push(entity_ref);
        }
    }
    refs
}

fn key_from_parts(owner: &str, repo: &str, number: &str) -> Option<EntityKey> {
    let number = number.parse::<u64>().ok()?;
    match EntityKey::new(owner, repo, number) {
        Ok(key) => Some(key),
        Err(error) => {
            tracing::debug!(%error, "dropping unparseable reference");
            None
        }
    }
}
