//! Linked-context traversal.
//!
//! Starting from a seed issue or pull request, the engine fetches the entity,
//! scans its body and every comment for references, and follows unseen
//! references level by level until the frontier is empty or the hop bound is
//! reached. Keys are claimed in the [`VisitedSet`] by the single driver loop
//! before any fetch for them is issued, so two branches that discover the same
//! entity can never both fetch it, and reference cycles terminate.
//!
//! Fetches of one level run concurrently through [`throttle`]; their results
//! are buffered by frontier position and absorbed in discovery order, which
//! keeps the output independent of completion timing.

use std::collections::HashSet;
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::code_links::{
    extract_code_links, fetch_linked_files, LinkedFile, DEFAULT_CODE_LINK_EXTENSIONS,
};
use crate::comment_streamliner::{
    dedupe_in_place, merge_into, streamline_for, Comment, StreamlinedComments,
};
use crate::entity_fetcher::{fetch_entity, FetchOptions, FetchedEntity};
use crate::entity_key::{EntityKey, EntityRef};
use crate::entity_source::EntitySource;
use crate::reference_extractor::{extract_references, ExtractionScope};
use crate::throttle::{throttle, DEFAULT_THROTTLE_LIMIT};

pub const DEFAULT_MAX_HOPS: usize = 2;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Raw body text per entity.
pub type SpecOrBodyMap = IndexMap<EntityKey, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Traversal policy knobs.
pub struct TraversalConfig {
    /// Maximum distance from the seed whose references are still followed.
    /// `0` fetches only the seed; `1` adds its direct links.
    pub max_hops: usize,
    /// In-flight fetch limit per level.
    pub concurrency: usize,
    /// Drop references whose owner differs from the seed's owner.
    pub same_owner_only: bool,
    /// Resolve `#N` shorthand against the repository of the scanned entity.
    pub follow_hash_references: bool,
    pub fetch_diffs: bool,
    pub fetch_timeout: Duration,
    pub follow_code_links: bool,
    pub code_link_extensions: Vec<String>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            concurrency: DEFAULT_THROTTLE_LIMIT,
            same_owner_only: true,
            follow_hash_references: true,
            fetch_diffs: true,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            follow_code_links: false,
            code_link_extensions: DEFAULT_CODE_LINK_EXTENSIONS
                .iter()
                .map(|extension| extension.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Terminal state of a visited entity.
pub enum EntityState {
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
/// An issue or pull request reached during traversal.
pub struct LinkedEntity {
    pub key: EntityKey,
    pub url: String,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Deduplicated conversation; `None` when the entity could not be fetched.
    pub comments: Option<Vec<Comment>>,
    pub is_pull_request: bool,
    pub diff: Option<String>,
    /// Distance from the seed.
    pub hop: usize,
    pub state: EntityState,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
/// Keys already fetched or being fetched in the current run, in claim order.
pub struct VisitedSet(IndexSet<EntityKey>);

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` visited. Returns `true` only for the first claim; the caller
    /// that wins the claim is the only one allowed to fetch the entity.
    pub fn claim(&mut self, key: &EntityKey) -> bool {
        self.0.insert(key.clone())
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityKey> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Serialize)]
/// Everything discovered from one seed.
pub struct ResolvedContext {
    pub seed: EntityKey,
    /// Seed first, then linked entities in discovery order.
    pub entities: Vec<LinkedEntity>,
    pub spec_or_bodies: SpecOrBodyMap,
    pub streamlined_comments: StreamlinedComments,
    pub visited: VisitedSet,
    pub linked_files: Vec<LinkedFile>,
}

impl ResolvedContext {
    pub fn entity(&self, key: &EntityKey) -> Option<&LinkedEntity> {
        self.entities.iter().find(|entity| &entity.key == key)
    }

    pub fn seed_entity(&self) -> Option<&LinkedEntity> {
        self.entity(&self.seed)
    }

    pub fn resolved_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.state == EntityState::Resolved)
            .count()
    }
}

/// Texts scanned for references from one entity: its own body first, then
/// every comment body. The body takes part in the scan as if it were the
/// first comment so references in issue descriptions are found too.
pub fn reference_scan_sources(entity: &FetchedEntity) -> Vec<&str> {
    entity
        .body
        .as_deref()
        .into_iter()
        .chain(entity.raw_comments.iter().filter_map(|comment| comment.body()))
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Resolve the linked context reachable from `seed`.
///
/// Never fails: unreachable entities are recorded as [`EntityState::Failed`]
/// and the seed always appears in the result.
pub async fn resolve_context(
    source: &dyn EntitySource,
    seed: &EntityRef,
    config: &TraversalConfig,
) -> ResolvedContext {
    let mut state = TraversalState::new(seed.key.clone());
    let options = FetchOptions {
        timeout: config.fetch_timeout,
        fetch_diffs: config.fetch_diffs,
    };

    state.visited.claim(&seed.key);
    let mut frontier = vec![seed.clone()];
    let mut hop = 0_usize;

    while !frontier.is_empty() {
        tracing::debug!(hop, entities = frontier.len(), "fetching traversal level");
        let fetched = throttle(
            frontier
                .iter()
                .map(|entity_ref| fetch_entity(source, entity_ref, options)),
            config.concurrency,
        )
        .await;

        let mut next = Vec::new();
        for (entity_ref, result) in frontier.into_iter().zip(fetched) {
            let Some(entity) = result else {
                state.record_failed(entity_ref, hop);
                continue;
            };
            if hop < config.max_hops {
                for found in discover_references(&entity, seed.owner(), config) {
                    if state.visited.claim(&found.key) {
                        next.push(found);
                    }
                }
            }
            state.record_resolved(entity, hop);
        }

        frontier = next;
        hop += 1;
    }

    if config.follow_code_links {
        state.collect_linked_files(source, seed.owner(), config).await;
    }
    state.finish()
}

fn discover_references(
    entity: &FetchedEntity,
    origin_owner: &str,
    config: &TraversalConfig,
) -> Vec<EntityRef> {
    let scope = ExtractionScope {
        default_owner: entity.key.owner(),
        default_repo: entity.key.repo(),
        origin_owner,
        same_owner_only: config.same_owner_only,
        follow_hash_references: config.follow_hash_references,
    };
    reference_scan_sources(entity)
        .into_iter()
        .flat_map(|text| extract_references(text, &scope))
        .filter(|found| found.key != entity.key)
        .collect()
}

struct TraversalState {
    seed: EntityKey,
    visited: VisitedSet,
    entities: Vec<LinkedEntity>,
    spec_or_bodies: SpecOrBodyMap,
    streamlined: StreamlinedComments,
    scan_texts: Vec<String>,
    linked_files: Vec<LinkedFile>,
}

impl TraversalState {
    fn new(seed: EntityKey) -> Self {
        Self {
            seed,
            visited: VisitedSet::new(),
            entities: Vec::new(),
            spec_or_bodies: SpecOrBodyMap::new(),
            streamlined: StreamlinedComments::new(),
            scan_texts: Vec::new(),
            linked_files: Vec::new(),
        }
    }

    fn record_resolved(&mut self, entity: FetchedEntity, hop: usize) {
        self.scan_texts.extend(
            reference_scan_sources(&entity)
                .into_iter()
                .map(str::to_string),
        );
        if let Some(body) = entity.body.as_ref() {
            self.spec_or_bodies.insert(entity.key.clone(), body.clone());
        }
        merge_into(
            &mut self.streamlined,
            streamline_for(&entity.key, &entity.raw_comments),
        );

        self.entities.push(LinkedEntity {
            key: entity.key,
            url: entity.url,
            title: Some(entity.title).filter(|title| !title.trim().is_empty()),
            body: entity.body,
            comments: Some(Vec::new()),
            is_pull_request: entity.is_pull_request,
            diff: entity.diff,
            hop,
            state: EntityState::Resolved,
        });
    }

    fn record_failed(&mut self, entity_ref: EntityRef, hop: usize) {
        tracing::warn!(entity = %entity_ref.key, hop, "entity unavailable; continuing without it");
        self.entities.push(LinkedEntity {
            key: entity_ref.key,
            url: entity_ref.url,
            title: None,
            body: None,
            comments: None,
            is_pull_request: false,
            diff: None,
            hop,
            state: EntityState::Failed,
        });
    }

    async fn collect_linked_files(
        &mut self,
        source: &dyn EntitySource,
        origin_owner: &str,
        config: &TraversalConfig,
    ) {
        let origin_owner = origin_owner.to_ascii_lowercase();
        let mut seen = HashSet::new();
        let links = self
            .scan_texts
            .iter()
            .flat_map(|text| extract_code_links(text, &config.code_link_extensions))
            .filter(|link| !config.same_owner_only || link.owner == origin_owner)
            .filter(|link| seen.insert(link.url.clone()))
            .collect::<Vec<_>>();
        if links.is_empty() {
            return;
        }
        tracing::debug!(links = links.len(), "fetching linked source files");
        self.linked_files =
            fetch_linked_files(source, links, config.concurrency, config.fetch_timeout).await;
    }

    fn finish(mut self) -> ResolvedContext {
        dedupe_in_place(&mut self.streamlined);
        for entity in &mut self.entities {
            if let Some(comments) = entity.comments.as_mut() {
                *comments = self
                    .streamlined
                    .get(&entity.key)
                    .cloned()
                    .unwrap_or_default();
            }
        }
        tracing::debug!(
            seed = %self.seed,
            visited = self.visited.len(),
            "traversal finished"
        );
        ResolvedContext {
            seed: self.seed,
            entities: self.entities,
            spec_or_bodies: self.spec_or_bodies,
            streamlined_comments: self.streamlined,
            visited: self.visited,
            linked_files: self.linked_files,
        }
    }
}
