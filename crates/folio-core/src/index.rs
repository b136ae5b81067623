use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use globset::GlobSet;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::classify::classify;
use crate::config::FolioConfig;
use crate::error::{FolioError, Result};
use crate::route::Route;
use crate::store::{DocumentKind, DocumentStore};
use crate::text::{excerpt, extract_title, tokenize, tokenize_set};

const EXCERPT_MAX_CHARS: usize = 160;

/// Decides whether a document needs re-tokenising.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationMarker {
    pub mtime: Option<SystemTime>,
    pub hash: blake3::Hash,
}

impl ModificationMarker {
    fn newer_than(&self, other: &Self) -> bool {
        match (self.mtime, other.mtime) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub route: Route,
    pub title: String,
    pub term_freqs: HashMap<String, u32>,
    pub excerpt_source: String,
    pub marker: ModificationMarker,
}

impl IndexEntry {
    fn derive(route: Route, content: String, mtime: Option<SystemTime>) -> Self {
        let mut term_freqs = HashMap::new();
        for token in tokenize(&content) {
            *term_freqs.entry(token).or_insert(0) += 1;
        }
        Self {
            title: extract_title(&route, &content),
            marker: ModificationMarker {
                mtime,
                hash: blake3::hash(content.as_bytes()),
            },
            route,
            term_freqs,
            excerpt_source: content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub route: String,
    pub title: String,
    pub excerpt: String,
    pub score: f32,
    pub matched_terms: usize,
    pub total_tf: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Indexed,
    Unchanged,
    Removed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct IndexState {
    entries: HashMap<String, IndexEntry>,
    postings: HashMap<String, BTreeMap<String, u32>>,
}

impl IndexState {
    /// Replace (or insert) the entry for its route, postings included.
    fn upsert(&mut self, entry: IndexEntry) {
        let key = entry.route.to_string();
        self.remove(&key);
        for (term, tf) in &entry.term_freqs {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(key.clone(), *tf);
        }
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(existing) = self.entries.remove(key) else {
            return false;
        };
        for term in existing.term_freqs.keys() {
            if let Some(routes) = self.postings.get_mut(term) {
                routes.remove(key);
                if routes.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Candidate {
    matched_terms: usize,
    total_tf: u32,
}

/// In-memory inverted index over the indexable documents of a store.
///
/// Cheap to clone; clones share state. Each upsert or removal happens under a
/// single write lock so queries never see a half-replaced entry.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    store: DocumentStore,
    ignore: GlobSet,
    max_file_bytes: u64,
    state: Arc<RwLock<IndexState>>,
    ready: Arc<AtomicBool>,
}

impl SearchIndex {
    pub fn new(store: DocumentStore, config: &FolioConfig) -> Result<Self> {
        Ok(Self {
            store,
            ignore: config.ignore_set()?,
            max_file_bytes: config.index_max_file_bytes,
            state: Arc::new(RwLock::new(IndexState::default())),
            ready: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// True once a full build has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(AtomicOrdering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, route: &Route) -> bool {
        self.read_state().entries.contains_key(&route.to_string())
    }

    #[must_use]
    pub fn entry(&self, route: &Route) -> Option<IndexEntry> {
        self.read_state().entries.get(&route.to_string()).cloned()
    }

    /// Routes (with term frequency) currently posted under `term`.
    #[must_use]
    pub fn postings(&self, term: &str) -> Vec<(String, u32)> {
        self.read_state()
            .postings
            .get(term)
            .map(|routes| routes.iter().map(|(r, tf)| (r.clone(), *tf)).collect())
            .unwrap_or_default()
    }

    /// Full scan of the tree on the blocking pool.
    pub async fn build(&self) -> Result<BuildReport> {
        let index = self.clone();
        tokio::task::spawn_blocking(move || index.build_blocking())
            .await
            .map_err(|err| FolioError::Internal(format!("index build task failed: {err}")))?
    }

    fn build_blocking(&self) -> Result<BuildReport> {
        let root = self.store.root().to_path_buf();
        let mut report = BuildReport::default();
        let mut seen = HashSet::new();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable tree entry");
                    report.failed += 1;
                    continue;
                }
            };
            if !item.file_type().is_file() {
                continue;
            }
            let route = match self.store.route_from_path(item.path()) {
                Ok(route) => route,
                Err(err) => {
                    tracing::warn!(path = %item.path().display(), error = %err, "skipping unroutable file");
                    report.failed += 1;
                    continue;
                }
            };
            if !self.is_indexable(&route, item.path()) {
                report.skipped += 1;
                continue;
            }
            let meta = match item.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(%route, error = %err, "skipping file without metadata");
                    report.failed += 1;
                    continue;
                }
            };
            if meta.len() > self.max_file_bytes {
                tracing::debug!(%route, len = meta.len(), "skipping oversized file");
                report.skipped += 1;
                continue;
            }
            let content = match std::fs::read_to_string(item.path()) {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(%route, error = %err, "skipping unreadable file");
                    report.failed += 1;
                    continue;
                }
            };
            seen.insert(route.to_string());
            let entry = IndexEntry::derive(route, content, meta.modified().ok());
            self.insert_from_build(entry);
            report.indexed += 1;
        }

        report.removed = self.drop_vanished(&seen);
        self.ready.store(true, AtomicOrdering::Release);
        tracing::info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            removed = report.removed,
            "search index build complete"
        );
        Ok(report)
    }

    /// A build-time read never replaces an entry that a concurrent `update`
    /// derived from a newer file.
    fn insert_from_build(&self, entry: IndexEntry) {
        let mut state = self.write_state();
        if let Some(existing) = state.entries.get(&entry.route.to_string())
            && existing.marker.newer_than(&entry.marker)
        {
            return;
        }
        state.upsert(entry);
    }

    fn drop_vanished(&self, seen: &HashSet<String>) -> usize {
        let stale: Vec<Route> = self
            .read_state()
            .entries
            .values()
            .filter(|entry| !seen.contains(&entry.route.to_string()))
            .map(|entry| entry.route.clone())
            .collect();
        let mut removed = 0;
        for route in stale {
            if !self.store.resolve(&route).is_file() && self.write_state().remove(&route.to_string())
            {
                removed += 1;
            }
        }
        removed
    }

    /// Re-derive one document from disk. Missing or no-longer-indexable
    /// documents are dropped from the index.
    pub async fn update(&self, route: &Route) -> Result<UpdateOutcome> {
        let path = self.store.resolve(route);
        let modified = match self.store.stat(route).await {
            Some(DocumentKind::File { len, modified })
                if len <= self.max_file_bytes && self.is_indexable(route, &path) =>
            {
                modified
            }
            _ => return Ok(self.remove(route)),
        };

        let content = match self.store.read_to_string(route).await {
            Ok(content) => content,
            Err(err) if err.is_not_found() => return Ok(self.remove(route)),
            Err(err) => {
                tracing::warn!(%route, error = %err, "dropping unreadable document from index");
                self.remove(route);
                return Err(err);
            }
        };

        let entry = IndexEntry::derive(route.clone(), content, modified);
        let mut state = self.write_state();
        if let Some(existing) = state.entries.get(&route.to_string())
            && existing.marker.hash == entry.marker.hash
        {
            return Ok(UpdateOutcome::Unchanged);
        }
        state.upsert(entry);
        tracing::debug!(%route, "document reindexed");
        Ok(UpdateOutcome::Indexed)
    }

    fn remove(&self, route: &Route) -> UpdateOutcome {
        if self.write_state().remove(&route.to_string()) {
            tracing::debug!(%route, "document removed from index");
        }
        UpdateOutcome::Removed
    }

    /// Ranked lookup: more distinct matched terms first, then higher total
    /// term frequency, then route order.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let terms = tokenize_set(query);
        if terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        let state = self.read_state();
        let mut candidates: HashMap<&str, Candidate> = HashMap::new();
        for term in &terms {
            let Some(routes) = state.postings.get(term) else {
                continue;
            };
            for (route, tf) in routes {
                let candidate = candidates.entry(route.as_str()).or_default();
                candidate.matched_terms += 1;
                candidate.total_tf += *tf;
            }
        }

        let mut ranked: Vec<(&str, Candidate)> = candidates.into_iter().collect();
        ranked.sort_by(|(a_route, a), (b_route, b)| {
            b.matched_terms
                .cmp(&a.matched_terms)
                .then_with(|| b.total_tf.cmp(&a.total_tf))
                .then_with(|| a_route.cmp(b_route))
        });
        ranked.truncate(limit);

        ranked
            .into_iter()
            .filter_map(|(route, candidate)| {
                let entry = state.entries.get(route)?;
                Some(SearchHit {
                    route: route.to_string(),
                    title: entry.title.clone(),
                    excerpt: excerpt(&entry.excerpt_source, &terms, EXCERPT_MAX_CHARS),
                    score: relevance(candidate),
                    matched_terms: candidate.matched_terms,
                    total_tf: candidate.total_tf,
                })
            })
            .collect()
    }

    fn is_indexable(&self, route: &Route, path: &Path) -> bool {
        if route.segments().iter().any(|segment| segment.starts_with('.')) {
            return false;
        }
        let relative = route.segments().join("/");
        !self.ignore.is_match(&relative) && classify(path).is_indexable()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "term counts stay far below f32 integer precision"
)]
fn relevance(candidate: Candidate) -> f32 {
    let tf = candidate.total_tf as f32;
    candidate.matched_terms as f32 + tf / (tf + 1.0)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
