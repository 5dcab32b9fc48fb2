// src/storage/mod.rs
use crate::extractors::SectionId;
use crate::utils::error::StorageError;
use crate::utils::slugify;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One extracted section of one document for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionEntry {
    pub country: String,
    pub section: String,
    pub source_doc: String,
    pub doc_url: String,
    pub extracted_text: String,
    pub created_utc: String,
}

impl ExtractionEntry {
    pub fn new(
        country: &str,
        section: SectionId,
        source_doc: &str,
        doc_url: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            country: country.to_string(),
            section: section.display_name().to_string(),
            source_doc: source_doc.to_string(),
            doc_url: doc_url.to_string(),
            extracted_text: text.to_string(),
            created_utc: format_timestamp(timestamp),
        }
    }

    fn key(&self) -> (String, String, String, String) {
        (
            self.country.clone(),
            self.section.clone(),
            self.source_doc.clone(),
            self.doc_url.clone(),
        )
    }
}

/// RFC 3339 at second precision with a `Z` suffix, e.g. `2024-05-01T12:00:00Z`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Merges a run's entries into an existing bundle.
///
/// Entries are keyed on (country, section, source_doc, doc_url). A new entry
/// replaces the old one with the same key, but keeps its `created_utc` when the
/// text did not change. Existing entries under other keys are kept.
///
/// Entries rebuilt from a country record carry no URL; they take over the URL
/// of the stored entry for the same country, section and document.
pub fn merge_bundle(existing: Vec<ExtractionEntry>, new_entries: Vec<ExtractionEntry>) -> Vec<ExtractionEntry> {
    let mut merged: HashMap<_, ExtractionEntry> =
        existing.into_iter().map(|entry| (entry.key(), entry)).collect();

    for mut entry in new_entries {
        if entry.doc_url.is_empty() {
            let known_url = merged
                .values()
                .filter(|e| {
                    !e.doc_url.is_empty()
                        && e.country == entry.country
                        && e.section == entry.section
                        && e.source_doc == entry.source_doc
                })
                .map(|e| e.doc_url.clone())
                .min();
            if let Some(url) = known_url {
                entry.doc_url = url;
            }
        }
        let key = entry.key();
        if let Some(previous) = merged.get(&key) {
            if previous.extracted_text == entry.extracted_text {
                entry.created_utc = previous.created_utc.clone();
            }
        }
        merged.insert(key, entry);
    }

    let mut entries: Vec<ExtractionEntry> = merged.into_values().collect();
    entries.sort_by(|a, b| {
        (&a.country, &a.source_doc, &a.created_utc, &a.doc_url)
            .cmp(&(&b.country, &b.source_doc, &b.created_utc, &b.doc_url))
    });
    entries
}

// --- Country record ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    pub doc_type: String,
    pub extracted_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub name: String,
    #[serde(default)]
    pub documents: Vec<DocumentText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionsPayload {
    #[serde(default)]
    pub sections: Vec<SectionRecord>,
}

/// Everything extracted for one country: sections, each with one text per document type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub name: String,
    #[serde(default)]
    pub sections: SectionsPayload,
}

impl CountryRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sections: SectionsPayload::default(),
        }
    }

    /// Sets the text of `doc_type` under `section`, creating either as needed.
    /// Empty texts are ignored.
    pub fn upsert(&mut self, section: &str, doc_type: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let sections = &mut self.sections.sections;
        let index = match sections.iter().position(|s| s.name == section) {
            Some(index) => index,
            None => {
                sections.push(SectionRecord {
                    name: section.to_string(),
                    documents: Vec::new(),
                });
                sections.len() - 1
            }
        };

        let documents = &mut sections[index].documents;
        match documents.iter_mut().find(|d| d.doc_type == doc_type) {
            Some(doc) => doc.extracted_text = text.to_string(),
            None => documents.push(DocumentText {
                doc_type: doc_type.to_string(),
                extracted_text: text.to_string(),
            }),
        }
    }

    /// Rebuilds entries for the requested sections from the record. The record
    /// does not keep document URLs, so `doc_url` is empty.
    pub fn to_entries(
        &self,
        requested: &[SectionId],
        timestamp: DateTime<Utc>,
    ) -> BTreeMap<SectionId, Vec<ExtractionEntry>> {
        let mut collected: BTreeMap<SectionId, Vec<ExtractionEntry>> = BTreeMap::new();
        for section in &self.sections.sections {
            let Some(id) = SectionId::from_display_name(&section.name) else {
                tracing::debug!("Ignoring unknown section '{}' in record for {}", section.name, self.name);
                continue;
            };
            if !requested.contains(&id) {
                continue;
            }
            for doc in &section.documents {
                collected.entry(id).or_default().push(ExtractionEntry::new(
                    &self.name,
                    id,
                    &doc.doc_type,
                    "",
                    &doc.extracted_text,
                    timestamp,
                ));
            }
        }
        collected
    }
}

// --- File naming helpers ---

fn file_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "document".to_string() } else { cleaned }
}

/// "GHG Inventory Module" -> "GhgInventoryModule"
fn pascal_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn bundle_path(&self, section: SectionId) -> PathBuf {
        self.base_dir.join(section.bundle_file())
    }

    /// Merges `entries` into the section bundle and writes one file per source
    /// document into the section directory. Returns the bundle path.
    pub fn write_section_outputs(
        &self,
        section: SectionId,
        entries: &[ExtractionEntry],
    ) -> Result<PathBuf, StorageError> {
        let section_dir = self.base_dir.join(section.directory());
        fs::create_dir_all(&section_dir)?;

        let bundle_path = self.bundle_path(section);
        let existing: Vec<ExtractionEntry> = read_json(&bundle_path)?.unwrap_or_default();
        let merged = merge_bundle(existing, entries.to_vec());
        write_json(&bundle_path, &merged)?;
        tracing::info!("Wrote {} ({} records)", bundle_path.display(), merged.len());

        // Per-document files hold the merged form of this run's entries
        let touched: HashSet<(&str, &str)> = entries
            .iter()
            .map(|e| (e.country.as_str(), e.source_doc.as_str()))
            .collect();
        let mut by_doc: BTreeMap<(&str, &str), Vec<&ExtractionEntry>> = BTreeMap::new();
        for entry in &merged {
            let doc_key = (entry.country.as_str(), entry.source_doc.as_str());
            if touched.contains(&doc_key) {
                by_doc.entry(doc_key).or_default().push(entry);
            }
        }
        for ((country, source_doc), doc_entries) in by_doc {
            let file_name = format!(
                "{}_{}_{}.json",
                file_component(country),
                pascal_case(section.display_name()),
                file_component(source_doc)
            );
            let doc_path = section_dir.join(file_name);
            write_json(&doc_path, &doc_entries)?;
            tracing::debug!("Wrote {}", doc_path.display());
        }

        Ok(bundle_path)
    }

    pub fn country_record_path(&self, country: &str) -> PathBuf {
        let slug = slugify(country);
        let slug = if slug.is_empty() { "unknown".to_string() } else { slug };
        self.base_dir.join("countries").join(format!("{}.json", slug))
    }

    pub fn load_country_record(&self, country: &str) -> Result<Option<CountryRecord>, StorageError> {
        read_json(&self.country_record_path(country))
    }

    /// Merges the entries into the stored record for their country and saves it.
    pub fn upsert_country_record(
        &self,
        country: &str,
        entries: &[ExtractionEntry],
    ) -> Result<PathBuf, StorageError> {
        let mut record = self
            .load_country_record(country)?
            .unwrap_or_else(|| CountryRecord::new(country));
        for entry in entries {
            record.upsert(&entry.section, &entry.source_doc, &entry.extracted_text);
        }

        let path = self.country_record_path(country);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_json(&path, &record)?;
        tracing::info!("Saved country record to {}", path.display());
        Ok(path)
    }
}
