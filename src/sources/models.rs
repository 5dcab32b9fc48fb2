// src/sources/models.rs
use crate::utils::error::FetchError;
use crate::utils::slugify;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Report acronym not glued to other capitals ("BURKINA" is not a BUR), with an optional number
static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Z])(BUR|BTR|NDC|NC)\s*(\d*)(?:[^A-Z0-9]|$)")
        .expect("Failed to compile ACRONYM_RE")
});

static FALLBACK_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{2,}\d*").expect("Failed to compile FALLBACK_TOKEN_RE"));

// Long-form report names, most specific first
const DOC_TYPE_HINTS: &[(&str, &str)] = &[
    ("INITIAL NATIONAL COMMUNICATION", "NC1"),
    ("FIRST NATIONAL COMMUNICATION", "NC1"),
    ("SECOND NATIONAL COMMUNICATION", "NC2"),
    ("THIRD NATIONAL COMMUNICATION", "NC3"),
    ("FOURTH NATIONAL COMMUNICATION", "NC4"),
    ("NATIONAL COMMUNICATION", "NC"),
    ("BIENNIAL UPDATE REPORT", "BUR"),
    ("BIENNIAL TRANSPARENCY REPORT", "BTR"),
    ("NATIONALLY DETERMINED CONTRIBUTION", "NDC"),
];

/// Infers a canonical source document id (`BUR2`, `NDC`, `NC3`, ...) from a
/// title, file name or URL. Falls back to the first capitalised token, then
/// `UNKNOWN`.
pub fn deduce_doc_type(label: &str) -> String {
    let upper = label.to_uppercase();

    if let Some(caps) = ACRONYM_RE.captures(&upper) {
        return format!("{}{}", &caps[1], &caps[2]);
    }

    if let Some((_, mapped)) = DOC_TYPE_HINTS.iter().find(|(needle, _)| upper.contains(needle)) {
        return mapped.to_string();
    }

    FALLBACK_TOKEN_RE
        .find(&upper)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// How a document's bytes should be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Html,
    Pdf,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "text" => Some(DocumentFormat::Text),
            "html" | "htm" | "xhtml" => Some(DocumentFormat::Html),
            "pdf" => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }

    /// File extension to give a download that has none, based on its content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("application/pdf") {
            Some(DocumentFormat::Pdf)
        } else if content_type.contains("html") {
            Some(DocumentFormat::Html)
        } else if content_type.starts_with("text/") {
            Some(DocumentFormat::Text)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Text => "txt",
            DocumentFormat::Html => "html",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

/// A report to process: either a local file or a URL to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSource {
    pub title: String,
    pub url: String,
    pub source_doc: String,
    pub local_path: Option<PathBuf>,
}

impl DocumentSource {
    /// Registers a local document. Its URL is the `file://` form of the absolute path.
    pub fn from_local_path(path: &Path) -> Result<Self, FetchError> {
        if !path.is_file() {
            return Err(FetchError::NotFound(path.display().to_string()));
        }
        let absolute = path.canonicalize()?;
        let title = absolute
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| absolute.display().to_string());
        let url = reqwest::Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| absolute.display().to_string());

        Ok(Self {
            source_doc: deduce_doc_type(&title),
            title,
            url,
            local_path: Some(absolute),
        })
    }

    pub fn from_url(url: &str) -> Result<Self, FetchError> {
        let parsed = reqwest::Url::parse(url.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        let title = parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(|segment| match segment.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => segment.to_string(),
            })
            .unwrap_or_else(|| parsed.host_str().unwrap_or("document").to_string());

        let mut source_doc = deduce_doc_type(&title);
        if source_doc == "UNKNOWN" {
            source_doc = deduce_doc_type(parsed.as_str());
        }

        Ok(Self {
            title,
            url: parsed.to_string(),
            source_doc,
            local_path: None,
        })
    }

    /// File name used when caching a download.
    pub fn download_file_name(&self, content_type: Option<&str>) -> String {
        let from_url = reqwest::Url::parse(&self.url).ok().and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(str::to_string)
        });
        let mut name = from_url.unwrap_or_else(|| {
            let slug = slugify(&self.title);
            if slug.is_empty() { "document".to_string() } else { slug }
        });

        if DocumentFormat::from_path(Path::new(&name)).is_none() {
            let format = content_type
                .and_then(DocumentFormat::from_content_type)
                .unwrap_or(DocumentFormat::Text);
            name = format!("{}.{}", name, format.extension());
        }
        name
    }
}
