use serde::{Deserialize, Serialize};

use folio_core::ResolveFlags;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub create: Option<String>,
    pub edit: Option<String>,
    pub raw: Option<String>,
    pub search: Option<String>,
}

impl PageQuery {
    pub fn into_flags(self) -> ResolveFlags {
        ResolveFlags {
            create: flag_enabled(self.create.as_deref()),
            edit: flag_enabled(self.edit.as_deref()),
            raw: flag_enabled(self.raw.as_deref()),
            search: self.search,
        }
    }
}

fn flag_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct SaveForm {
    pub content: String,
}

impl SaveForm {
    /// Browsers submit textarea line breaks as CRLF.
    pub fn normalized_content(&self) -> String {
        self.content.replace("\r\n", "\n")
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
}
