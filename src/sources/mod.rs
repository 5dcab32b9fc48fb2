// src/sources/mod.rs
pub mod client;
pub mod models;

pub use client::{load_cookies, load_document_text, DocumentClient};
pub use models::{DocumentFormat, DocumentSource};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Lists the documents in `dir` this tool recognises, sorted by path.
pub fn scan_document_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && DocumentFormat::from_path(path).is_some())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Registers URLs and local documents, logging and skipping the ones that
/// cannot be used, and drops duplicates by URL (first occurrence wins).
pub fn gather_sources(
    urls: &[String],
    local_docs: &[PathBuf],
    local_dir: Option<&Path>,
) -> Vec<DocumentSource> {
    let mut sources = Vec::new();

    for url in urls {
        match DocumentSource::from_url(url) {
            Ok(source) => sources.push(source),
            Err(e) => tracing::error!("Failed to register document URL {}: {}", url, e),
        }
    }

    let mut local_paths = local_docs.to_vec();
    if let Some(dir) = local_dir {
        match scan_document_dir(dir) {
            Ok(found) => {
                tracing::info!("Found {} document(s) in {}", found.len(), dir.display());
                local_paths.extend(found);
            }
            Err(e) => tracing::error!("Failed to read document directory {}: {}", dir.display(), e),
        }
    }

    for path in &local_paths {
        match DocumentSource::from_local_path(path) {
            Ok(source) => sources.push(source),
            Err(e) => tracing::error!("Failed to register local document {}: {}", path.display(), e),
        }
    }

    let mut seen = HashSet::new();
    sources.retain(|source| seen.insert(source.url.clone()));
    tracing::info!("Identified {} candidate document(s)", sources.len());
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_sources_dedups_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let bur = dir.path().join("Cuba_BUR1.txt");
        let ndc = dir.path().join("Cuba_NDC.html");
        std::fs::write(&bur, "a").unwrap();
        std::fs::write(&ndc, "<p>b</p>").unwrap();
        std::fs::write(dir.path().join("notes.docx"), "ignored").unwrap();

        let urls = vec![
            "https://unfccc.int/files/Cuba_BTR1.pdf".to_string(),
            "https://unfccc.int/files/Cuba_BTR1.pdf".to_string(),
            "::bad::".to_string(),
        ];
        let local = vec![bur.clone(), dir.path().join("missing.txt")];
        let sources = gather_sources(&urls, &local, Some(dir.path()));

        let docs: Vec<_> = sources.iter().map(|s| s.source_doc.as_str()).collect();
        assert_eq!(docs, vec!["BTR1", "BUR1", "NDC"]);
    }

    #[test]
    fn test_scan_document_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.htm", "c.pdf", "d.xlsx"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let names: Vec<_> = scan_document_dir(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.htm", "b.txt", "c.pdf"]);
    }
}
