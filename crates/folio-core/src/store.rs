use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{FolioError, Result};
use crate::route::Route;

/// What a stat of a route found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    File { len: u64, modified: Option<SystemTime> },
    Directory,
    Other,
}

impl DocumentKind {
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Filesystem-backed access to the document tree. Every route is turned into a
/// path by [`DocumentStore::resolve`] and checked against the canonical root
/// before any I/O touches it.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open a store over an existing directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(|err| {
            FolioError::Validation(format!(
                "document root is not accessible: {} ({err})",
                root.as_ref().display()
            ))
        })?;
        if !root.is_dir() {
            return Err(FolioError::Validation(format!(
                "document root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn resolve(&self, route: &Route) -> PathBuf {
        let mut out = self.root.clone();
        for segment in route.segments() {
            out.push(segment);
        }
        out
    }

    pub fn route_from_path(&self, path: &Path) -> Result<Route> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            FolioError::Validation(format!("path is outside root: {}", path.display()))
        })?;

        let mut route = Route::root();
        for comp in relative.components() {
            match comp {
                Component::Normal(s) => route = route.join(&s.to_string_lossy())?,
                Component::CurDir => {}
                _ => {
                    return Err(FolioError::PathTraversal(path.display().to_string()));
                }
            }
        }
        Ok(route)
    }

    /// `None` when the path is missing or cannot be inspected.
    pub async fn stat(&self, route: &Route) -> Option<DocumentKind> {
        let path = self.resolve(route);
        if self.ensure_path_within_root(&path).await.is_err() {
            return None;
        }
        let meta = fs::metadata(&path).await.ok()?;
        let kind = if meta.is_file() {
            DocumentKind::File {
                len: meta.len(),
                modified: meta.modified().ok(),
            }
        } else if meta.is_dir() {
            DocumentKind::Directory
        } else {
            DocumentKind::Other
        };
        Some(kind)
    }

    pub async fn read_to_string(&self, route: &Route) -> Result<String> {
        let path = self.checked_file(route).await?;
        Ok(fs::read_to_string(path).await?)
    }

    pub async fn read_bytes(&self, route: &Route) -> Result<Vec<u8>> {
        let path = self.checked_file(route).await?;
        Ok(fs::read(path).await?)
    }

    /// Replace an existing file's content through a temp file + rename.
    /// A symlinked document is written through to its target, and the
    /// target's permissions carry over to the new content.
    pub async fn write_atomic(&self, route: &Route, content: &str) -> Result<()> {
        let link = self.resolve(route);
        self.ensure_path_within_root(&link).await?;
        let path = match fs::canonicalize(&link).await {
            Ok(target) => target,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => link,
            Err(err) => return Err(err.into()),
        };
        let permissions = match fs::metadata(&path).await {
            Ok(meta) => Some(meta.permissions()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let parent = path
            .parent()
            .ok_or_else(|| FolioError::Validation(format!("target has no parent: {route}")))?;

        let file_name = path
            .file_name()
            .and_then(|x| x.to_str())
            .ok_or_else(|| FolioError::Validation(format!("invalid target filename: {route}")))?;
        let tmp_name = format!(".{file_name}.folio.tmp.{}", uuid::Uuid::new_v4().simple());
        let tmp_path = parent.join(tmp_name);

        let staged = async {
            let mut tmp = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&tmp_path)
                .await?;
            tmp.write_all(content.as_bytes()).await?;
            tmp.sync_all().await?;
            if let Some(permissions) = permissions {
                fs::set_permissions(&tmp_path, permissions).await?;
            }
            fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(err) = staged {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FolioError::from(err));
        }
        Ok(())
    }

    /// Create parent directories and an empty file. Never truncates an
    /// existing file.
    pub async fn create_empty(&self, route: &Route) -> Result<()> {
        if route.is_root() {
            return Err(FolioError::Validation(
                "cannot create a file at the root".to_string(),
            ));
        }
        let path = self.resolve(route);
        self.ensure_path_within_root(&path).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .await?;
        Ok(())
    }

    /// Write bytes to a file that must not exist yet.
    pub async fn write_new(&self, route: &Route, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(route);
        self.ensure_path_within_root(&path).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Store uploaded bytes in `dir` under a sanitised form of `file_name`.
    /// A taken name gets a short uuid suffix before its extension.
    pub async fn write_upload(&self, dir: &Route, file_name: &str, bytes: &[u8]) -> Result<Route> {
        let name = sanitize_file_name(file_name)?;
        let first = dir.join(&name)?;
        match self.write_new(&first, bytes).await {
            Ok(()) => return Ok(first),
            Err(FolioError::Io(err)) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let renamed = dir.join(&with_name_suffix(&name, &suffix[..8]))?;
        self.write_new(&renamed, bytes).await?;
        Ok(renamed)
    }

    async fn checked_file(&self, route: &Route) -> Result<PathBuf> {
        let path = self.resolve(route);
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FolioError::NotFound(route.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if meta.is_dir() {
            return Err(FolioError::Validation(format!(
                "cannot read directory: {route}"
            )));
        }
        self.ensure_path_within_root(&path).await?;
        Ok(path)
    }

    async fn ensure_path_within_root(&self, path: &Path) -> Result<()> {
        let mut probe = path.to_path_buf();
        while fs::symlink_metadata(&probe).await.is_err() {
            if !probe.pop() {
                return Err(FolioError::SecurityViolation(format!(
                    "path has no existing ancestor: {}",
                    path.display()
                )));
            }
        }

        let probe_canonical = fs::canonicalize(&probe).await.map_err(|_| {
            FolioError::SecurityViolation(format!(
                "path cannot be resolved: {}",
                path.display()
            ))
        })?;
        if !probe_canonical.starts_with(&self.root) {
            return Err(FolioError::SecurityViolation(format!(
                "path escapes root boundary: {}",
                path.display()
            )));
        }
        Ok(())
    }
}

const MAX_UPLOAD_NAME_CHARS: usize = 120;

/// Reduce a client-supplied file name to one safe path segment.
fn sanitize_file_name(raw: &str) -> Result<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_UPLOAD_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return Err(FolioError::Validation(format!(
            "upload file name is not usable: {raw:?}"
        )));
    }
    Ok(cleaned.to_string())
}

fn with_name_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{suffix}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}-{suffix}"),
    }
}
