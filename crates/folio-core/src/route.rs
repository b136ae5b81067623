use std::fmt::{Display, Formatter};
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::classify::is_markdown_extension;
use crate::error::{FolioError, Result};

/// Characters escaped inside one URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Root-relative, slash-separated document path. Always normalised: no empty,
/// `.` or `..` segments, so a `Route` can never name anything above the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Route {
    segments: Vec<String>,
}

impl Route {
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(Self {
            segments: normalize_segments(value)?,
        })
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn join(&self, child: &str) -> Result<Self> {
        let child_segments = normalize_segments(child)?;
        let mut segments = self.segments.clone();
        segments.extend(child_segments);
        Ok(Self { segments })
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    #[must_use]
    pub fn has_markdown_extension(&self) -> bool {
        self.extension()
            .is_some_and(|ext| is_markdown_extension(&ext))
    }

    /// Same route with `.md` appended unless it already carries a markdown
    /// extension. The root has no file name and is returned unchanged.
    #[must_use]
    pub fn with_markdown_extension(&self) -> Self {
        if self.is_root() || self.has_markdown_extension() {
            return self.clone();
        }
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            last.push_str(".md");
        }
        Self { segments }
    }

    #[must_use]
    pub fn as_path_string(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// URL path for this route with every segment percent-encoded, plus an
    /// optional query string.
    #[must_use]
    pub fn href(&self, query: Option<&str>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            out.extend(utf8_percent_encode(segment, SEGMENT));
        }
        if out.is_empty() {
            out.push('/');
        }
        if let Some(query) = query {
            out.push('?');
            out.push_str(query);
        }
        out
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_path_string())
    }
}

impl FromStr for Route {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn normalize_segments(raw_path: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for segment in raw_path.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(FolioError::PathTraversal(raw_path.to_string()));
        }
        if segment.contains('\\') || segment.contains('\0') {
            return Err(FolioError::InvalidRoute(raw_path.to_string()));
        }
        out.push(segment.to_string());
    }
    Ok(out)
}
