//! Canonical identity for issues and pull requests.
//!
//! Every surface form a reference can take (html link, api link, bare
//! `owner/repo/number` triple, `owner/repo#N`, `#N`) is parsed by a named
//! [`ReferenceShape`] strategy and normalized to one [`EntityKey`]. Owner and
//! repository names are lowercased because GitHub resolves them
//! case-insensitively.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ContextError;

pub(crate) const OWNER_PATTERN: &str = r"[A-Za-z0-9][A-Za-z0-9-]*";
pub(crate) const REPO_PATTERN: &str = r"[A-Za-z0-9_.-]+";

static HTML_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^https?://(?:www\.)?github\.com/({OWNER_PATTERN})/({REPO_PATTERN})/(?:pulls?|issues?)/(\d+)(?:/.*)?$"
    ))
    .expect("html url pattern compiles")
});

static API_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^https?://api\.github\.com/repos/({OWNER_PATTERN})/({REPO_PATTERN})/(?:pulls|issues)/(\d+)(?:/.*)?$"
    ))
    .expect("api url pattern compiles")
});

static REST_RESOURCE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^https?://[^/\s]+(?:/[^\s]*?)?/repos/({OWNER_PATTERN})/({REPO_PATTERN})/(?:pulls|issues)/(\d+)(?:[/?#].*)?$"
    ))
    .expect("rest resource url pattern compiles")
});

static BARE_TRIPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({OWNER_PATTERN})/({REPO_PATTERN})/(\d+)$"))
        .expect("bare triple pattern compiles")
});

static CROSS_REPO_HASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({OWNER_PATTERN})/({REPO_PATTERN})#(\d+)$"))
        .expect("cross repo hash pattern compiles")
});

static HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\d+)$").expect("hash pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Normalized `(owner, repo, number)` identity, displayed as `owner/repo/number`.
pub struct EntityKey {
    owner: String,
    repo: String,
    number: u64,
}

impl EntityKey {
    pub fn new(owner: &str, repo: &str, number: u64) -> Result<Self, ContextError> {
        let owner = owner.trim().to_ascii_lowercase();
        let repo = repo.trim().to_ascii_lowercase();
        let repo = repo.trim_end_matches(".git");
        if owner.is_empty() || repo.is_empty() || owner.contains('/') || repo.contains('/') {
            return Err(ContextError::InvalidKey(format!(
                "expected owner/repo/number, got '{owner}/{repo}/{number}'"
            )));
        }
        if number == 0 {
            return Err(ContextError::InvalidKey(format!(
                "entity number must be positive in '{owner}/{repo}/0'"
            )));
        }
        Ok(Self {
            repo: repo.to_string(),
            owner,
            number,
        })
    }

    /// Parse any supported reference shape that does not need a default repository.
    pub fn parse(raw: &str) -> Result<Self, ContextError> {
        parse_reference(raw, None).map(|entity_ref| entity_ref.key)
    }

    /// Key of a REST resource url on any api host, including GitHub Enterprise
    /// bases such as `https://ghe.example.com/api/v3`.
    pub fn from_rest_url(url: &str) -> Result<Self, ContextError> {
        let captures = REST_RESOURCE_URL_RE.captures(url.trim()).ok_or_else(|| {
            ContextError::InvalidKey(format!("not a REST issue url: '{url}'"))
        })?;
        let number = captures[3].parse::<u64>().map_err(|_| {
            ContextError::InvalidKey(format!("entity number out of range in '{url}'"))
        })?;
        Self::new(&captures[1], &captures[2], number)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// `owner/repo #number`, the label used in conversation headers.
    pub fn display_label(&self) -> String {
        format!("{}/{} #{}", self.owner, self.repo, self.number)
    }

    /// Issue-style html url; GitHub redirects it to the pull request when needed.
    pub fn html_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/issues/{}",
            self.owner, self.repo, self.number
        )
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.number)
    }
}

impl FromStr for EntityKey {
    type Err = ContextError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for EntityKey {
    type Error = ContextError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A resolved reference: the normalized key plus the url it was found under.
pub struct EntityRef {
    pub key: EntityKey,
    pub url: String,
}

impl EntityRef {
    pub fn new(key: EntityKey, url: impl Into<String>) -> Self {
        Self {
            key,
            url: url.into(),
        }
    }

    pub fn from_key(key: EntityKey) -> Self {
        let url = key.html_url();
        Self { key, url }
    }

    pub fn owner(&self) -> &str {
        self.key.owner()
    }

    pub fn repo(&self) -> &str {
        self.key.repo()
    }

    pub fn number(&self) -> u64 {
        self.key.number()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates the surface forms a reference to an entity can take.
pub enum ReferenceShape {
    /// `https://github.com/{owner}/{repo}/(issues|pull)/{number}`
    HtmlUrl,
    /// `https://api.github.com/repos/{owner}/{repo}/(issues|pulls)/{number}`
    ApiUrl,
    /// `{owner}/{repo}/{number}`
    BareTriple,
    /// `{owner}/{repo}#{number}`
    CrossRepoHash,
    /// `#{number}`, resolved against a default repository.
    HashReference,
}

impl ReferenceShape {
    pub const ALL: [ReferenceShape; 5] = [
        ReferenceShape::HtmlUrl,
        ReferenceShape::ApiUrl,
        ReferenceShape::BareTriple,
        ReferenceShape::CrossRepoHash,
        ReferenceShape::HashReference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HtmlUrl => "html_url",
            Self::ApiUrl => "api_url",
            Self::BareTriple => "bare_triple",
            Self::CrossRepoHash => "cross_repo_hash",
            Self::HashReference => "hash_reference",
        }
    }

    fn is_url(self) -> bool {
        matches!(self, Self::HtmlUrl | Self::ApiUrl)
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::HtmlUrl => &HTML_URL_RE,
            Self::ApiUrl => &API_URL_RE,
            Self::BareTriple => &BARE_TRIPLE_RE,
            Self::CrossRepoHash => &CROSS_REPO_HASH_RE,
            Self::HashReference => &HASH_RE,
        }
    }

    /// Parse `raw` with this strategy only. `None` means the shape does not apply.
    pub fn parse(
        self,
        raw: &str,
        default_repo: Option<(&str, &str)>,
    ) -> Option<Result<EntityKey, ContextError>> {
        let candidate = if self.is_url() {
            strip_url_fragment(raw)
        } else {
            raw.trim()
        };
        let captures = self.pattern().captures(candidate)?;
        let number = match captures.get(captures.len() - 1)?.as_str().parse::<u64>() {
            Ok(number) => number,
            Err(_) => {
                return Some(Err(ContextError::InvalidKey(format!(
                    "entity number out of range in '{raw}'"
                ))))
            }
        };
        if self == Self::HashReference {
            return Some(match default_repo {
                Some((owner, repo)) => EntityKey::new(owner, repo, number),
                None => Err(ContextError::InvalidReference(format!(
                    "{raw} (hash reference without a default repository)"
                ))),
            });
        }
        Some(EntityKey::new(&captures[1], &captures[2], number))
    }
}

/// Drop `#fragment` and `?query` suffixes plus trailing slashes from a url.
pub fn strip_url_fragment(raw: &str) -> &str {
    let trimmed = raw.trim();
    let end = trimmed.find(['#', '?']).unwrap_or(trimmed.len());
    trimmed[..end].trim_end_matches('/')
}

/// Returns the first shape whose pattern accepts `raw`.
pub fn classify_reference(raw: &str) -> Option<ReferenceShape> {
    ReferenceShape::ALL.into_iter().find(|shape| {
        let candidate = if shape.is_url() {
            strip_url_fragment(raw)
        } else {
            raw.trim()
        };
        shape.pattern().is_match(candidate)
    })
}

/// Dispatch `raw` to the matching [`ReferenceShape`] parser.
pub fn parse_reference(
    raw: &str,
    default_repo: Option<(&str, &str)>,
) -> Result<EntityRef, ContextError> {
    let shape =
        classify_reference(raw).ok_or_else(|| ContextError::InvalidReference(raw.to_string()))?;
    let key = shape
        .parse(raw, default_repo)
        .unwrap_or_else(|| Err(ContextError::InvalidReference(raw.to_string())))?;
    let url = if shape.is_url() {
        strip_url_fragment(raw).to_string()
    } else {
        key.html_url()
    };
    Ok(EntityRef::new(key, url))
}

/// Normalize any default-free reference shape to its canonical key.
pub fn normalize_key(raw: &str) -> Result<EntityKey, ContextError> {
    EntityKey::parse(raw)
}
