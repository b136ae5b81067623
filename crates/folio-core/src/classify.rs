use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    Markdown,
    Image,
    SourceCode,
    Other,
}

impl ContentClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Image => "image",
            Self::SourceCode => "source_code",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn is_indexable(self) -> bool {
        matches!(self, Self::Markdown | Self::SourceCode)
    }
}

const MARKDOWN: &[&str] = &["md", "markdown", "mdown", "mkd"];

const IMAGE: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "avif",
];

const SOURCE: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("jsx", "javascript"),
    ("go", "go"),
    ("c", "c"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("hpp", "cpp"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("sh", "bash"),
    ("bash", "bash"),
    ("zsh", "bash"),
    ("toml", "toml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("json", "json"),
    ("xml", "xml"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sql", "sql"),
    ("lua", "lua"),
    ("txt", "plaintext"),
    ("log", "plaintext"),
];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// `ext` is expected lowercase, as returned by `Route::extension`.
#[must_use]
pub fn is_markdown_extension(ext: &str) -> bool {
    MARKDOWN.contains(&ext)
}

#[must_use]
pub fn classify(path: &Path) -> ContentClass {
    let Some(ext) = extension_of(path) else {
        return ContentClass::Other;
    };
    if is_markdown_extension(&ext) {
        ContentClass::Markdown
    } else if IMAGE.contains(&ext.as_str()) {
        ContentClass::Image
    } else if SOURCE.iter().any(|(known, _)| *known == ext) {
        ContentClass::SourceCode
    } else {
        ContentClass::Other
    }
}

#[must_use]
pub fn source_language(path: &Path) -> &'static str {
    extension_of(path)
        .and_then(|ext| {
            SOURCE
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, lang)| *lang)
        })
        .unwrap_or("plaintext")
}

#[must_use]
pub fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map_or_else(|| "application/octet-stream".to_string(), |m| m.to_string())
}
