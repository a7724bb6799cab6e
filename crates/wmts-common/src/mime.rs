//! Tile image formats.

use serde::{Deserialize, Serialize};

/// A tile output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimeType {
    pub internal_name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub file_extension: String,
}

impl MimeType {
    pub fn new(
        internal_name: impl Into<String>,
        mime_type: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            internal_name: internal_name.into(),
            mime_type: mime_type.into(),
            file_extension: file_extension.into(),
        }
    }
}

/// Formats the server can store, searchable by name, MIME type or extension.
#[derive(Debug, Clone)]
pub struct MimeTypeRegistry {
    entries: Vec<MimeType>,
}

impl Default for MimeTypeRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                MimeType::new("png", "image/png", "png"),
                MimeType::new("jpeg", "image/jpeg", "jpg"),
                MimeType::new("bil16", "application/bil16", "bil"),
                MimeType::new("bil32", "application/bil32", "bil"),
            ],
        }
    }
}

impl MimeTypeRegistry {
    /// Builtin formats followed by `extra`. An internal name that is already
    /// registered is skipped.
    pub fn with_extra(extra: impl IntoIterator<Item = MimeType>) -> Self {
        let mut registry = Self::default();
        for mime in extra {
            registry.register(mime);
        }
        registry
    }

    /// Returns false when the internal name was already taken.
    pub fn register(&mut self, mime: MimeType) -> bool {
        if self.by_name(&mime.internal_name).is_some() {
            return false;
        }
        self.entries.push(mime);
        true
    }

    pub fn by_name(&self, name: &str) -> Option<&MimeType> {
        self.entries
            .iter()
            .find(|m| m.internal_name.eq_ignore_ascii_case(name))
    }

    pub fn by_type(&self, mime_type: &str) -> Option<&MimeType> {
        self.entries
            .iter()
            .find(|m| m.mime_type.eq_ignore_ascii_case(mime_type))
    }

    pub fn by_extension(&self, extension: &str) -> Option<&MimeType> {
        let extension = extension.trim_start_matches('.');
        self.entries
            .iter()
            .find(|m| m.file_extension.eq_ignore_ascii_case(extension))
    }

    /// Resolve a configured format: MIME type first, then internal name.
    pub fn resolve(&self, format: &str) -> Option<&MimeType> {
        self.by_type(format).or_else(|| self.by_name(format))
    }

    pub fn all(&self) -> &[MimeType] {
        &self.entries
    }
}
