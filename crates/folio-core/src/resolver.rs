//! Turns a request route plus query flags into a concrete action on the
//! document tree.
//!
//! The machine starts in [`ResolveState::StatPath`] and moves through
//! [`ResolveState::RootFileFallback`] and [`ResolveState::MissingPath`] until it
//! reaches [`ResolveState::RenderPage`], which produces a [`Resolution`]. All
//! per-request state lives in a [`ResolutionContext`] owned by one request.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::classify::{ContentClass, classify, mime_for, source_language};
use crate::config::FolioConfig;
use crate::error::FolioError;
use crate::index::SearchIndex;
use crate::render;
use crate::route::Route;
use crate::store::{DocumentKind, DocumentStore};
use crate::text::extract_title;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveFlags {
    pub create: bool,
    pub edit: bool,
    pub search: Option<String>,
    pub raw: bool,
}

impl ResolveFlags {
    /// The search text, if it holds anything besides whitespace.
    #[must_use]
    pub fn search_query(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveError {
    /// `directory` is set when `route` names a folder whose root files are all missing.
    #[error("file not found: {route}")]
    NotFound { route: Route, directory: bool },

    #[error("this folder has no home page yet")]
    NoHomePage,

    #[error("cannot create a file at a directory path: {route}")]
    CreateConflict { route: Route },

    #[error("could not create {route}: {reason}")]
    CreateFailure { route: String, reason: String },

    #[error("could not save {route}: {reason}")]
    WriteFailure { route: String, reason: String },

    #[error("{route} exists but is not a document")]
    NotADocument { route: String },

    #[error("invalid path: {raw}")]
    InvalidRoute { raw: String },
}

/// Suggested next action shown beside an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub label: String,
    pub href: String,
}

impl ResolveError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::NoHomePage => "NO_HOME_PAGE",
            Self::CreateConflict { .. } => "CREATE_CONFLICT",
            Self::CreateFailure { .. } => "CREATE_FAILURE",
            Self::WriteFailure { .. } => "WRITE_FAILURE",
            Self::NotADocument { .. } => "NOT_A_DOCUMENT",
            Self::InvalidRoute { .. } => "INVALID_ROUTE",
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Not found",
            Self::NoHomePage => "No home page",
            Self::CreateConflict { .. } => "Cannot create here",
            Self::CreateFailure { .. } => "Creation failed",
            Self::WriteFailure { .. } => "Save failed",
            Self::NotADocument { .. } => "Not a document",
            Self::InvalidRoute { .. } => "Invalid path",
        }
    }

    /// Links offered to the user; root files are the candidates for a home page.
    #[must_use]
    pub fn hints(&self, root_files: &[String]) -> Vec<Hint> {
        match self {
            Self::NoHomePage => create_hints(&Route::root(), root_files),
            Self::NotFound {
                route,
                directory: true,
            } => {
                let mut hints = create_hints(route, root_files);
                hints.push(home_hint());
                hints
            }
            Self::NotFound {
                route,
                directory: false,
            } => {
                let mut hints = vec![Hint {
                    label: format!("Create {route}"),
                    href: route.href(Some("create=1")),
                }];
                if let Some(parent) = route.parent().filter(|parent| !parent.is_root()) {
                    hints.push(browse_hint(&parent));
                }
                hints.push(home_hint());
                hints
            }
            Self::CreateConflict { route } => vec![browse_hint(route)],
            _ => vec![home_hint()],
        }
    }
}

/// One create link per root file inside `directory`.
fn create_hints(directory: &Route, root_files: &[String]) -> Vec<Hint> {
    root_files
        .iter()
        .filter_map(|name| directory.join(name).ok())
        .map(|candidate| Hint {
            label: format!("Create {candidate}"),
            href: candidate.href(Some("create=1")),
        })
        .collect()
}

fn browse_hint(route: &Route) -> Hint {
    Hint {
        label: format!("Browse {route}"),
        href: route.href(None),
    }
}

fn home_hint() -> Hint {
    Hint {
        label: "Go home".to_string(),
        href: Route::root().href(None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMode {
    View,
    Edit,
    Media,
    Source,
    Search,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageIcon {
    Document,
    Image,
    Code,
    Search,
    Warning,
}

impl PageIcon {
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Document => "\u{1F4C4}",
            Self::Image => "\u{1F5BC}",
            Self::Code => "\u{1F4BB}",
            Self::Search => "\u{1F50D}",
            Self::Warning => "\u{26A0}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub route: Route,
    pub title: String,
    pub icon: PageIcon,
    pub mode: PageMode,
    pub body_html: String,
    /// Raw text for the editor in [`PageMode::Edit`].
    pub source_text: Option<String>,
    pub error: Option<ResolveError>,
    pub hints: Vec<Hint>,
    pub search_query: Option<String>,
    pub search_count: Option<usize>,
    pub modified: Option<DateTime<Utc>>,
}

impl Page {
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self.mode, PageMode::View | PageMode::Edit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Page(Page),
    Raw {
        route: Route,
        bytes: Vec<u8>,
        mime: String,
    },
    /// Redirect to `route`, keeping the create flag.
    Redirect { route: Route, create: bool },
    /// The route is not owned by the resolver; the host answers it.
    NotHandled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    StatPath,
    RootFileFallback,
    MissingPath,
    RenderPage,
}

#[derive(Debug)]
pub enum Step {
    Next(ResolveState),
    Done(Resolution),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionContext {
    /// Candidate currently being resolved.
    pub route: Route,
    /// Directory whose root files are being tried.
    pub directory: Option<Route>,
    /// Index of the next root file to try.
    pub cursor: usize,
    pub flags: ResolveFlags,
    pub error: Option<ResolveError>,
    pub kind: Option<DocumentKind>,
    pub created: bool,
}

impl ResolutionContext {
    #[must_use]
    pub fn new(route: Route, flags: ResolveFlags) -> Self {
        Self {
            route,
            directory: None,
            cursor: 0,
            flags,
            error: None,
            kind: None,
            created: false,
        }
    }

    #[must_use]
    pub fn in_fallback(&self) -> bool {
        self.directory
            .as_ref()
            .is_some_and(|directory| *directory != self.route)
    }

    fn fail(&mut self, error: ResolveError) -> Step {
        self.error = Some(error);
        Step::Next(ResolveState::RenderPage)
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    store: DocumentStore,
    index: SearchIndex,
    root_files: Vec<String>,
    search_limit: usize,
}

impl Resolver {
    #[must_use]
    pub fn new(index: SearchIndex, config: &FolioConfig) -> Self {
        Self {
            store: index.store().clone(),
            index,
            root_files: config.root_files.clone(),
            search_limit: config.search_limit,
        }
    }

    #[must_use]
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    #[must_use]
    pub fn root_files(&self) -> &[String] {
        &self.root_files
    }

    pub async fn resolve(&self, raw_route: &str, flags: ResolveFlags) -> Resolution {
        let (mut ctx, mut state) = match Route::parse(raw_route) {
            Ok(route) => (ResolutionContext::new(route, flags), ResolveState::StatPath),
            Err(err) => {
                tracing::debug!(raw_route, error = %err, "rejecting route");
                let mut ctx = ResolutionContext::new(Route::root(), flags);
                ctx.error = Some(ResolveError::InvalidRoute {
                    raw: raw_route.to_string(),
                });
                (ctx, ResolveState::RenderPage)
            }
        };

        loop {
            match self.step(&mut ctx, state).await {
                Step::Next(next) => {
                    tracing::debug!(route = %ctx.route, from = ?state, to = ?next, "resolver transition");
                    state = next;
                }
                Step::Done(resolution) => return resolution,
            }
        }
    }

    /// Perform exactly one transition from `state`.
    pub async fn step(&self, ctx: &mut ResolutionContext, state: ResolveState) -> Step {
        match state {
            ResolveState::StatPath => self.stat_path(ctx).await,
            ResolveState::RootFileFallback => self.root_file_fallback(ctx),
            ResolveState::MissingPath => self.missing_path(ctx).await,
            ResolveState::RenderPage => Step::Done(self.render_page(ctx).await),
        }
    }

    async fn stat_path(&self, ctx: &mut ResolutionContext) -> Step {
        ctx.kind = self.store.stat(&ctx.route).await;
        match ctx.kind {
            Some(DocumentKind::File { .. }) => Step::Next(ResolveState::RenderPage),
            None => Step::Next(ResolveState::MissingPath),
            Some(DocumentKind::Directory) if ctx.in_fallback() => {
                let route = ctx.route.to_string();
                ctx.fail(ResolveError::NotADocument { route })
            }
            Some(DocumentKind::Directory) if ctx.flags.create => {
                let route = ctx.route.clone();
                ctx.fail(ResolveError::CreateConflict { route })
            }
            Some(DocumentKind::Directory) if ctx.flags.search_query().is_some() => {
                Step::Next(ResolveState::RenderPage)
            }
            Some(DocumentKind::Directory) => {
                ctx.directory = Some(ctx.route.clone());
                ctx.cursor = 0;
                Step::Next(ResolveState::RootFileFallback)
            }
            Some(DocumentKind::Other) => {
                let route = ctx.route.to_string();
                ctx.fail(ResolveError::NotADocument { route })
            }
        }
    }

    fn root_file_fallback(&self, ctx: &mut ResolutionContext) -> Step {
        let Some(directory) = ctx.directory.clone() else {
            return Step::Next(ResolveState::MissingPath);
        };
        while let Some(name) = self.root_files.get(ctx.cursor) {
            ctx.cursor += 1;
            match directory.join(name) {
                Ok(candidate) => {
                    ctx.route = candidate;
                    return Step::Next(ResolveState::StatPath);
                }
                Err(err) => tracing::warn!(name, error = %err, "ignoring invalid root file name"),
            }
        }

        ctx.route = directory.clone();
        if directory.is_root() {
            ctx.fail(ResolveError::NoHomePage)
        } else {
            ctx.fail(ResolveError::NotFound {
                route: directory,
                directory: true,
            })
        }
    }

    async fn missing_path(&self, ctx: &mut ResolutionContext) -> Step {
        if !ctx.flags.create {
            if ctx.in_fallback() {
                return Step::Next(ResolveState::RootFileFallback);
            }
            let route = ctx.route.clone();
            return ctx.fail(ResolveError::NotFound {
                route,
                directory: false,
            });
        }

        let normalized = ctx.route.with_markdown_extension();
        if normalized != ctx.route {
            return Step::Done(Resolution::Redirect {
                route: normalized,
                create: true,
            });
        }

        if ctx.created {
            let route = ctx.route.to_string();
            ctx.route = Route::root();
            return ctx.fail(ResolveError::CreateFailure {
                route,
                reason: "file is missing right after creation".to_string(),
            });
        }

        match self.store.create_empty(&ctx.route).await {
            Ok(()) => {
                tracing::info!(route = %ctx.route, "created document");
                self.after_create(ctx).await
            }
            // Another request created it between our stat and create.
            Err(FolioError::Io(err)) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(route = %ctx.route, "document already created");
                self.after_create(ctx).await
            }
            Err(err) => {
                tracing::warn!(route = %ctx.route, error = %err, "document creation failed");
                let route = ctx.route.to_string();
                ctx.route = Route::root();
                ctx.fail(ResolveError::CreateFailure {
                    route,
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn after_create(&self, ctx: &mut ResolutionContext) -> Step {
        ctx.created = true;
        if let Err(err) = self.index.update(&ctx.route).await {
            tracing::warn!(route = %ctx.route, error = %err, "index update after create failed");
        }
        Step::Next(ResolveState::StatPath)
    }

    async fn render_page(&self, ctx: &mut ResolutionContext) -> Resolution {
        if let Some(error) = ctx.error.take() {
            return Resolution::Page(self.error_page(ctx.route.clone(), error));
        }

        if let Some(query) = ctx.flags.search_query() {
            let hits = self.index.search(query, self.search_limit);
            let (body_html, count) = render::search_html(query, &hits, self.index.is_ready());
            return Resolution::Page(Page {
                route: ctx.route.clone(),
                title: format!("Search: {query}"),
                icon: PageIcon::Search,
                mode: PageMode::Search,
                body_html,
                source_text: None,
                error: None,
                hints: Vec::new(),
                search_query: Some(query.to_string()),
                search_count: Some(count),
                modified: None,
            });
        }

        let route = ctx.route.clone();
        let path = self.store.resolve(&route);
        if ctx.flags.raw {
            return match self.store.read_bytes(&route).await {
                Ok(bytes) => Resolution::Raw {
                    mime: mime_for(&path),
                    route,
                    bytes,
                },
                Err(err) => {
                    tracing::warn!(%route, error = %err, "raw read failed");
                    Resolution::NotHandled
                }
            };
        }

        let modified = match ctx.kind {
            Some(DocumentKind::File { modified, .. }) => modified.map(to_utc),
            _ => None,
        };
        let class = classify(&path);
        tracing::debug!(%route, class = class.as_str(), "rendering document");
        let (mode, icon, body_html, source_text, title) = match class {
            ContentClass::Markdown => {
                let Some(text) = self.read_text(&route).await else {
                    return Resolution::NotHandled;
                };
                let title = extract_title(&route, &text);
                if ctx.flags.edit || ctx.flags.create {
                    (PageMode::Edit, PageIcon::Document, String::new(), Some(text), title)
                } else {
                    let body = render::markdown_html(&text);
                    (PageMode::View, PageIcon::Document, body, None, title)
                }
            }
            ContentClass::Image => (
                PageMode::Media,
                PageIcon::Image,
                render::image_html(&route),
                None,
                file_title(&route),
            ),
            ContentClass::SourceCode => {
                let Some(text) = self.read_text(&route).await else {
                    return Resolution::NotHandled;
                };
                let body = render::source_html(&text, source_language(&path));
                (PageMode::Source, PageIcon::Code, body, None, file_title(&route))
            }
            ContentClass::Other => return Resolution::NotHandled,
        };

        Resolution::Page(Page {
            route,
            title,
            icon,
            mode,
            body_html,
            source_text,
            error: None,
            hints: Vec::new(),
            search_query: None,
            search_count: None,
            modified,
        })
    }

    fn error_page(&self, route: Route, error: ResolveError) -> Page {
        let hints = error.hints(&self.root_files);
        Page {
            route,
            title: error.title().to_string(),
            icon: PageIcon::Warning,
            mode: PageMode::Error,
            body_html: format!(
                "<p class=\"error-message\">{}</p>",
                render::escape_html(&error.to_string())
            ),
            source_text: None,
            hints,
            error: Some(error),
            search_query: None,
            search_count: None,
            modified: None,
        }
    }

    async fn read_text(&self, route: &Route) -> Option<String> {
        match self.store.read_to_string(route).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(%route, error = %err, "document read failed");
                None
            }
        }
    }

    /// Save entry point: overwrite an existing file, reindex it, re-render it.
    /// Anything that stops the write leaves the request to the host.
    pub async fn save(&self, raw_route: &str, content: &str) -> Resolution {
        match self.write_document(raw_route, content).await {
            Ok(route) => {
                let mut ctx = ResolutionContext::new(route, ResolveFlags::default());
                ctx.kind = self.store.stat(&ctx.route).await;
                self.render_page(&mut ctx).await
            }
            Err(err) => {
                tracing::warn!(raw_route, error = %err, "save rejected");
                Resolution::NotHandled
            }
        }
    }

    pub async fn write_document(
        &self,
        raw_route: &str,
        content: &str,
    ) -> std::result::Result<Route, ResolveError> {
        let route = Route::parse(raw_route).map_err(|_| ResolveError::InvalidRoute {
            raw: raw_route.to_string(),
        })?;
        let refusal = match self.store.stat(&route).await {
            Some(kind) if kind.is_file() => None,
            Some(kind) if kind.is_dir() => Some("target is a directory"),
            _ => Some("target is not an existing file"),
        };
        if let Some(reason) = refusal {
            return Err(ResolveError::WriteFailure {
                route: route.to_string(),
                reason: reason.to_string(),
            });
        }
        self.store
            .write_atomic(&route, content)
            .await
            .map_err(|err| ResolveError::WriteFailure {
                route: route.to_string(),
                reason: err.to_string(),
            })?;
        if let Err(err) = self.index.update(&route).await {
            tracing::warn!(%route, error = %err, "index update after save failed");
        }
        tracing::info!(%route, bytes = content.len(), "saved document");
        Ok(route)
    }
}

fn file_title(route: &Route) -> String {
    route
        .file_name()
        .map_or_else(|| "/".to_string(), ToString::to_string)
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{TempDir, tempdir};

    use super::*;

    struct Fixture {
        temp: TempDir,
        resolver: Resolver,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let temp = tempdir().expect("tempdir");
        for (name, content) in files {
            let path = temp.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, content).expect("seed");
        }
        let config = FolioConfig::default();
        let store = DocumentStore::open(temp.path()).expect("store");
        let index = SearchIndex::new(store, &config).expect("index");
        Fixture {
            resolver: Resolver::new(index, &config),
            temp,
        }
    }

    fn flags() -> ResolveFlags {
        ResolveFlags::default()
    }

    fn create() -> ResolveFlags {
        ResolveFlags {
            create: true,
            ..ResolveFlags::default()
        }
    }

    fn page(resolution: Resolution) -> Page {
        match resolution {
            Resolution::Page(page) => page,
            other => panic!("expected page, got {other:?}"),
        }
    }

    fn route(raw: &str) -> Route {
        Route::parse(raw).expect("route")
    }

    fn file_count(dir: &std::path::Path) -> usize {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .count()
    }

    #[tokio::test]
    async fn existing_markdown_renders_html() {
        let fx = fixture(&[("guide.md", "# Guide\n\nhello *world*")]);
        let page = page(fx.resolver.resolve("/guide.md", flags()).await);
        assert_eq!(page.mode, PageMode::View);
        assert_eq!(page.title, "Guide");
        assert!(page.body_html.contains("<em>world</em>"));
        assert!(page.modified.is_some());
    }

    #[tokio::test]
    async fn edit_flag_returns_raw_text() {
        let fx = fixture(&[("guide.md", "# Guide\n\nhello")]);
        let edit = ResolveFlags {
            edit: true,
            ..flags()
        };
        let page = page(fx.resolver.resolve("/guide.md", edit).await);
        assert_eq!(page.mode, PageMode::Edit);
        assert_eq!(page.source_text.as_deref(), Some("# Guide\n\nhello"));
    }

    #[tokio::test]
    async fn directory_falls_back_through_root_files_in_order() {
        let fx = fixture(&[
            ("only-lower/readme.md", "# Lower readme"),
            ("both/index.md", "# Index wins"),
            ("both/README.md", "# Readme loses"),
        ]);
        let lower = page(fx.resolver.resolve("/only-lower", flags()).await);
        assert_eq!(lower.route, route("/only-lower/readme.md"));
        assert_eq!(lower.title, "Lower readme");

        let both = page(fx.resolver.resolve("/both/", flags()).await);
        assert_eq!(both.route, route("/both/index.md"));
    }

    #[tokio::test]
    async fn empty_tree_root_is_no_home_page() {
        let fx = fixture(&[]);
        let page = page(fx.resolver.resolve("/", flags()).await);
        assert_eq!(page.error, Some(ResolveError::NoHomePage));
        assert_eq!(page.mode, PageMode::Error);
        assert_eq!(page.route, Route::root());
        let hrefs: Vec<_> = page.hints.iter().map(|hint| hint.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["/index.md?create=1", "/README.md?create=1", "/readme.md?create=1"]
        );
    }

    fn hrefs(page: &Page) -> Vec<&str> {
        page.hints.iter().map(|hint| hint.href.as_str()).collect()
    }

    #[tokio::test]
    async fn exhausted_fallback_below_root_is_not_found() {
        let fx = fixture(&[("docs/other.md", "x")]);
        let page = page(fx.resolver.resolve("/docs", flags()).await);
        assert_eq!(
            page.error,
            Some(ResolveError::NotFound {
                route: route("/docs"),
                directory: true,
            })
        );
        assert_eq!(
            hrefs(&page),
            vec![
                "/docs/index.md?create=1",
                "/docs/README.md?create=1",
                "/docs/readme.md?create=1",
                "/"
            ]
        );
    }

    #[tokio::test]
    async fn folder_not_found_hint_creates_its_home_page() {
        let fx = fixture(&[("docs/other.md", "x")]);
        let missing = page(fx.resolver.resolve("/docs", flags()).await);
        let first = missing.hints[0].href.trim_end_matches("?create=1");

        let created = page(fx.resolver.resolve(first, create()).await);
        assert_eq!(created.error, None);
        assert_eq!(created.mode, PageMode::Edit);
        assert!(fx.temp.path().join("docs/index.md").is_file());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let fx = fixture(&[("notes/kept.md", "x")]);
        let page = page(fx.resolver.resolve("/notes/nope.md", flags()).await);
        assert_eq!(page.error.as_ref().map(ResolveError::code), Some("NOT_FOUND"));
        assert!(!page.is_editable());
        assert_eq!(
            hrefs(&page),
            vec!["/notes/nope.md?create=1", "/notes", "/"]
        );
    }

    #[tokio::test]
    async fn hint_links_percent_encode_file_names() {
        let fx = fixture(&[]);
        let hashed = page(fx.resolver.resolve("/x#y.md", flags()).await);
        assert_eq!(hrefs(&hashed), vec!["/x%23y.md?create=1", "/"]);

        let question = page(fx.resolver.resolve("/what?.md", flags()).await);
        assert_eq!(hrefs(&question)[0], "/what%3F.md?create=1");
    }

    #[tokio::test]
    async fn create_at_directory_is_conflict_and_writes_nothing() {
        let fx = fixture(&[("docs/a.md", "x")]);
        let before = file_count(fx.temp.path());
        let page = page(fx.resolver.resolve("/docs", create()).await);
        assert_eq!(
            page.error,
            Some(ResolveError::CreateConflict {
                route: route("/docs")
            })
        );
        assert_eq!(hrefs(&page), vec!["/docs"]);
        assert_eq!(file_count(fx.temp.path()), before);
        assert!(!fx.temp.path().join("docs/index.md").exists());
    }

    #[tokio::test]
    async fn create_flow_normalizes_redirects_then_opens_editor() {
        let fx = fixture(&[]);
        let first = fx.resolver.resolve("/notes", create()).await;
        assert_eq!(
            first,
            Resolution::Redirect {
                route: route("/notes.md"),
                create: true
            }
        );
        assert!(!fx.temp.path().join("notes").exists());
        assert!(!fx.temp.path().join("notes.md").exists());

        let second = page(fx.resolver.resolve("/notes.md", create()).await);
        assert_eq!(second.mode, PageMode::Edit);
        assert_eq!(second.source_text.as_deref(), Some(""));
        assert!(fx.temp.path().join("notes.md").is_file());
    }

    #[tokio::test]
    async fn create_keeps_every_markdown_extension() {
        let fx = fixture(&[]);
        for name in ["/n.mkd", "/n.mdown", "/n.markdown"] {
            let page = page(fx.resolver.resolve(name, create()).await);
            assert_eq!(page.mode, PageMode::Edit, "{name}");
            assert_eq!(page.route, route(name));
        }
        assert!(fx.temp.path().join("n.mkd").is_file());
        assert!(!fx.temp.path().join("n.mkd.md").exists());
    }

    #[tokio::test]
    async fn create_racing_an_existing_file_continues_to_editor() {
        let fx = fixture(&[]);
        let mut ctx = ResolutionContext::new(route("/raced.md"), create());
        let step = fx.resolver.step(&mut ctx, ResolveState::StatPath).await;
        assert!(matches!(step, Step::Next(ResolveState::MissingPath)));

        fs::write(fx.temp.path().join("raced.md"), "first writer").expect("seed");
        let step = fx.resolver.step(&mut ctx, ResolveState::MissingPath).await;
        assert!(matches!(step, Step::Next(ResolveState::StatPath)));
        assert!(ctx.created);
        assert_eq!(ctx.error, None);
        assert_eq!(ctx.route, route("/raced.md"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_creates_of_one_route_both_open_editor() {
        let fx = fixture(&[]);
        for n in 0..50 {
            let raw = format!("/n{n}.md");
            let (first, second) = tokio::join!(
                fx.resolver.resolve(&raw, create()),
                fx.resolver.resolve(&raw, create())
            );
            for resolution in [first, second] {
                let page = page(resolution);
                assert_eq!(page.error, None, "{raw}");
                assert_eq!(page.mode, PageMode::Edit);
                assert_eq!(page.route, route(&raw));
            }
        }
        assert_eq!(file_count(fx.temp.path()), 50);
    }

    #[tokio::test]
    async fn create_makes_parent_directories_and_indexes() {
        let fx = fixture(&[]);
        let page = page(fx.resolver.resolve("/a/b/c.md", create()).await);
        assert_eq!(page.mode, PageMode::Edit);
        assert!(fx.temp.path().join("a/b/c.md").is_file());
        assert!(fx.resolver.index().contains(&route("/a/b/c.md")));
    }

    #[tokio::test]
    async fn create_on_existing_file_keeps_content() {
        let fx = fixture(&[("kept.md", "keep me")]);
        let page = page(fx.resolver.resolve("/kept.md", create()).await);
        assert_eq!(page.source_text.as_deref(), Some("keep me"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn create_failure_resets_route_to_root() {
        let fx = fixture(&[]);
        let outside = tempdir().expect("outside");
        std::os::unix::fs::symlink(outside.path(), fx.temp.path().join("link")).expect("symlink");

        let page = page(fx.resolver.resolve("/link/x.md", create()).await);
        assert_eq!(page.route, Route::root());
        assert_eq!(page.error.as_ref().map(ResolveError::code), Some("CREATE_FAILURE"));
        assert!(!outside.path().join("x.md").exists());
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_touching_disk() {
        let fx = fixture(&[]);
        let page = page(fx.resolver.resolve("/../etc/passwd", create()).await);
        assert_eq!(page.error.as_ref().map(ResolveError::code), Some("INVALID_ROUTE"));
        assert_eq!(page.route, Route::root());
    }

    #[tokio::test]
    async fn search_on_directory_skips_fallback() {
        let fx = fixture(&[("index.md", "# Home\n\nhello"), ("b.md", "needle here")]);
        fx.resolver.index().build().await.expect("build");
        let search = ResolveFlags {
            search: Some("needle".to_string()),
            ..flags()
        };
        let page = page(fx.resolver.resolve("/", search).await);
        assert_eq!(page.mode, PageMode::Search);
        assert_eq!(page.route, Route::root());
        assert_eq!(page.search_count, Some(1));
        assert!(page.body_html.contains("href=\"/b.md\""));
    }

    #[tokio::test]
    async fn whitespace_search_is_ignored() {
        let fx = fixture(&[("index.md", "# Home")]);
        let blank = ResolveFlags {
            search: Some("   ".to_string()),
            ..flags()
        };
        let page = page(fx.resolver.resolve("/", blank).await);
        assert_eq!(page.mode, PageMode::View);
        assert_eq!(page.route, route("/index.md"));
    }

    #[tokio::test]
    async fn error_wins_over_search_and_raw() {
        let fx = fixture(&[]);
        let everything = ResolveFlags {
            search: Some("x".to_string()),
            raw: true,
            edit: true,
            ..flags()
        };
        let page = page(fx.resolver.resolve("/missing.md", everything).await);
        assert_eq!(page.mode, PageMode::Error);
        assert!(page.source_text.is_none());
    }

    #[tokio::test]
    async fn raw_flag_serves_bytes() {
        let fx = fixture(&[("img/cat.png", "PNGDATA"), ("a.md", "# raw")]);
        let raw = ResolveFlags { raw: true, ..flags() };
        match fx.resolver.resolve("/img/cat.png", raw.clone()).await {
            Resolution::Raw { bytes, mime, .. } => {
                assert_eq!(bytes, b"PNGDATA");
                assert_eq!(mime, "image/png");
            }
            other => panic!("expected raw, got {other:?}"),
        }
        assert!(matches!(
            fx.resolver.resolve("/a.md", raw).await,
            Resolution::Raw { .. }
        ));
    }

    #[tokio::test]
    async fn content_classes_dispatch_to_views() {
        let fx = fixture(&[
            ("pic.jpg", "jpeg"),
            ("cat#2.png", "png"),
            ("main.rs", "fn main() { let x = 1 < 2; }"),
            ("data.bin", "binary"),
        ]);
        let image = page(fx.resolver.resolve("/pic.jpg", flags()).await);
        assert_eq!(image.mode, PageMode::Media);
        assert!(image.body_html.contains("/pic.jpg?raw=1"));
        let hashed = page(fx.resolver.resolve("/cat#2.png", flags()).await);
        assert!(hashed.body_html.contains("src=\"/cat%232.png?raw=1\""));

        let source = page(fx.resolver.resolve("/main.rs", flags()).await);
        assert_eq!(source.mode, PageMode::Source);
        assert!(source.body_html.contains("language-rust"));
        assert!(source.body_html.contains("1 &lt; 2"));

        assert_eq!(
            fx.resolver.resolve("/data.bin", flags()).await,
            Resolution::NotHandled
        );
    }

    #[tokio::test]
    async fn directory_named_like_root_file_is_an_error() {
        let fx = fixture(&[("docs/index.md/inner.md", "x"), ("docs/README.md", "# R")]);
        let page = page(fx.resolver.resolve("/docs", flags()).await);
        assert_eq!(
            page.error,
            Some(ResolveError::NotADocument {
                route: "/docs/index.md".to_string()
            })
        );
    }

    #[tokio::test]
    async fn step_transitions_are_individually_observable() {
        let fx = fixture(&[("docs/README.md", "# R")]);
        let mut ctx = ResolutionContext::new(route("/docs"), flags());

        let step = fx.resolver.step(&mut ctx, ResolveState::StatPath).await;
        assert!(matches!(step, Step::Next(ResolveState::RootFileFallback)));
        assert_eq!(ctx.directory, Some(route("/docs")));

        let step = fx.resolver.step(&mut ctx, ResolveState::RootFileFallback).await;
        assert!(matches!(step, Step::Next(ResolveState::StatPath)));
        assert_eq!(ctx.route, route("/docs/index.md"));
        assert_eq!(ctx.cursor, 1);

        let step = fx.resolver.step(&mut ctx, ResolveState::StatPath).await;
        assert!(matches!(step, Step::Next(ResolveState::MissingPath)));

        let step = fx.resolver.step(&mut ctx, ResolveState::MissingPath).await;
        assert!(matches!(step, Step::Next(ResolveState::RootFileFallback)));

        let step = fx.resolver.step(&mut ctx, ResolveState::RootFileFallback).await;
        assert!(matches!(step, Step::Next(ResolveState::StatPath)));
        assert_eq!(ctx.route, route("/docs/README.md"));

        let step = fx.resolver.step(&mut ctx, ResolveState::StatPath).await;
        assert!(matches!(step, Step::Next(ResolveState::RenderPage)));
    }

    #[tokio::test]
    async fn save_writes_reindexes_and_rerenders() {
        let fx = fixture(&[("a.md", "# Old\n\noldterm")]);
        fx.resolver.index().build().await.expect("build");

        let page = page(fx.resolver.save("/a.md", "# New\n\nnewterm").await);
        assert_eq!(page.mode, PageMode::View);
        assert_eq!(page.title, "New");
        assert_eq!(
            fs::read_to_string(fx.temp.path().join("a.md")).expect("read"),
            "# New\n\nnewterm"
        );
        assert!(fx.resolver.index().search("oldterm", 10).is_empty());
        assert_eq!(fx.resolver.index().search("newterm", 10).len(), 1);
    }

    #[tokio::test]
    async fn save_refuses_missing_targets() {
        let fx = fixture(&[("dir/a.md", "x")]);
        assert_eq!(
            fx.resolver.save("/ghost.md", "content").await,
            Resolution::NotHandled
        );
        assert!(!fx.temp.path().join("ghost.md").exists());
        assert_eq!(fx.resolver.save("/dir", "content").await, Resolution::NotHandled);

        let err = fx
            .resolver
            .write_document("/ghost.md", "content")
            .await
            .expect_err("must refuse");
        assert_eq!(err.code(), "WRITE_FAILURE");
        let err = fx
            .resolver
            .write_document("/dir", "content")
            .await
            .expect_err("must refuse");
        assert_eq!(
            err,
            ResolveError::WriteFailure {
                route: "/dir".to_string(),
                reason: "target is a directory".to_string(),
            }
        );
        let err = fx
            .resolver
            .write_document("/../x.md", "content")
            .await
            .expect_err("must refuse");
        assert_eq!(err.code(), "INVALID_ROUTE");
    }
}
