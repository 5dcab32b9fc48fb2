// src/extractors/section.rs

// --- Imports ---
use crate::extractors::definitions::SectionDefinition;
use crate::extractors::keywords::cluster_keywords;
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

// --- Regex Patterns (Lazy Static) ---
// A line holding nothing but a roman-numeral label, e.g. "IV." or "  xii. "
static ROMAN_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*[ivxlcdm]+\.\s*$").expect("Failed to compile ROMAN_LABEL_RE")
});

// --- Data Structures ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Heading,
    BodyPattern,
    Keywords,
}

/// Where a section was first located, before boundaries are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    /// Position of the section in the definition list; breaks start-offset ties.
    pub order: usize,
    pub name: String,
    pub start: usize,
    /// End of the text the locating pattern matched.
    pub match_end: usize,
    pub method: ExtractionMethod,
}

/// A resolved, contiguous byte range of the document attributed to one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub order: usize,
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub match_end: usize,
    pub method: ExtractionMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSection {
    pub name: String,
    pub text: String,
    pub method: ExtractionMethod,
}

struct CompiledSection {
    name: String,
    headings: Vec<Regex>,
    patterns: Vec<Regex>,
    keywords: Vec<String>,
}

// --- Pattern compilation ---

/// Heading patterns: case-insensitive, `^`/`$` anchor at line boundaries.
pub fn compile_heading(pattern: &str) -> Result<Regex, ExtractError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|e| ExtractError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Body patterns: case-insensitive, `.` also matches newlines.
pub fn compile_body(pattern: &str) -> Result<Regex, ExtractError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| ExtractError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Compiles every pattern, logging and dropping the ones that fail. A broken
/// pattern simply never matches.
fn compile_all(
    section: &str,
    patterns: &[String],
    compile: fn(&str) -> Result<Regex, ExtractError>,
) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match compile(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!("Section '{}': {}", section, e);
                None
            }
        })
        .collect()
}

// --- Heading Locator ---

/// Tries each pattern in order and returns the `(start, end)` of the first
/// pattern that matches anywhere. First match wins; no scoring.
pub fn locate_first(text: &str, patterns: &[Regex]) -> Option<(usize, usize)> {
    patterns.iter().find_map(|re| {
        re.find(text).map(|m| {
            tracing::trace!("Pattern '{}' matched at {}..{}", re.as_str(), m.start(), m.end());
            (m.start(), m.end())
        })
    })
}

/// Earliest match of any pattern starting in `from..to`. Searching with
/// `find_at` keeps `^` anchored to real line starts.
pub fn next_match_in(text: &str, patterns: &[Regex], from: usize, to: usize) -> Option<usize> {
    if from >= to {
        return None;
    }
    patterns
        .iter()
        .filter_map(|re| re.find_at(text, from).map(|m| m.start()))
        .filter(|&start| start < to)
        .min()
}

// --- Span Resolver ---

/// Moves `start` back to cover a roman-numeral label for the heading, either on
/// the same line before the match (`"IV. "` + match) or alone on the line above.
pub fn fold_roman_label(text: &str, start: usize) -> usize {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..start];
    if ROMAN_LABEL_RE.is_match(prefix) {
        return line_start;
    }

    if prefix.trim().is_empty() && line_start > 0 {
        let prev_end = line_start - 1;
        let prev_start = text[..prev_end].rfind('\n').map_or(0, |i| i + 1);
        if ROMAN_LABEL_RE.is_match(&text[prev_start..prev_end]) {
            return prev_start;
        }
    }
    start
}

/// Orders located sections by start offset and bounds each one by the start of
/// the next (or the end of the document for the last).
///
/// Ties on the start offset keep definition order; the earlier section then
/// resolves to an empty span. A warning is logged because the document gives no
/// way to tell which section really owns that text.
pub fn resolve_spans(text: &str, matches: Vec<HeadingMatch>) -> Vec<SectionSpan> {
    let mut located: Vec<HeadingMatch> = matches
        .into_iter()
        .map(|mut m| {
            m.start = fold_roman_label(text, m.start);
            m
        })
        .collect();
    located.sort_by_key(|m| (m.start, m.order));

    for pair in located.windows(2) {
        if pair[0].start == pair[1].start {
            tracing::warn!(
                "Sections '{}' and '{}' both start at offset {}; keeping definition order",
                pair[0].name,
                pair[1].name,
                pair[0].start
            );
        }
    }

    let ends: Vec<usize> = located
        .iter()
        .skip(1)
        .map(|m| m.start)
        .chain(std::iter::once(text.len()))
        .collect();

    located
        .into_iter()
        .zip(ends)
        .map(|(m, end)| SectionSpan {
            order: m.order,
            name: m.name,
            start: m.start,
            end,
            match_end: m.match_end,
            method: m.method,
        })
        .collect()
}

// --- Main Extractor Structure ---
pub struct SectionExtractor {
    sections: Vec<CompiledSection>,
    min_section_size: usize,
}

impl SectionExtractor {
    pub fn new(definitions: &[SectionDefinition]) -> Self {
        let sections = definitions
            .iter()
            .map(|def| CompiledSection {
                name: def.name.clone(),
                headings: compile_all(&def.name, &def.headings, compile_heading),
                patterns: compile_all(&def.name, &def.patterns, compile_body),
                keywords: def.keywords.clone(),
            })
            .collect();
        Self {
            sections,
            min_section_size: 0,
        }
    }

    /// Sections whose trimmed text is shorter than this many bytes are dropped.
    pub fn with_min_section_size(mut self, min_section_size: usize) -> Self {
        self.min_section_size = min_section_size;
        self
    }

    /// Locates every section via heading patterns, then body patterns.
    /// Sections matched by neither are returned separately by index.
    pub fn locate(&self, text: &str) -> (Vec<HeadingMatch>, Vec<usize>) {
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for (order, section) in self.sections.iter().enumerate() {
            if let Some((start, match_end)) = locate_first(text, &section.headings) {
                tracing::debug!("Located heading for '{}' at offset {}", section.name, start);
                matched.push(HeadingMatch {
                    order,
                    name: section.name.clone(),
                    start,
                    match_end,
                    method: ExtractionMethod::Heading,
                });
            } else if let Some((start, match_end)) = locate_first(text, &section.patterns) {
                tracing::debug!("Matched '{}' via body pattern at offset {}", section.name, start);
                matched.push(HeadingMatch {
                    order,
                    name: section.name.clone(),
                    start,
                    match_end,
                    method: ExtractionMethod::BodyPattern,
                });
            } else {
                unmatched.push(order);
            }
        }
        (matched, unmatched)
    }

    /// Extracts all configured sections from normalized document text.
    /// Results come back in definition order; sections with no text are omitted.
    pub fn extract(&self, text: &str, source: &str) -> Vec<ExtractedSection> {
        tracing::info!("Extracting {} section(s) from {}", self.sections.len(), source);
        let (matched, unmatched) = self.locate(text);

        let mut extracted: Vec<(usize, ExtractedSection)> = Vec::new();

        for span in resolve_spans(text, matched) {
            let mut end = span.end;
            // Another heading line of the same section closes it, e.g. "Key barriers" then "Main barriers"
            if span.method == ExtractionMethod::Heading {
                let headings = &self.sections[span.order].headings;
                if let Some(cut) = next_match_in(text, headings, span.match_end, end) {
                    tracing::debug!("Section '{}' cut at repeated heading, offset {}", span.name, cut);
                    end = cut;
                }
            }
            let section_text = text[span.start..end].trim();
            if section_text.is_empty() {
                tracing::warn!("Section '{}' text empty after extraction in {}", span.name, source);
                continue;
            }
            extracted.push((
                span.order,
                ExtractedSection {
                    name: span.name,
                    text: section_text.to_string(),
                    method: span.method,
                },
            ));
        }

        for order in unmatched {
            let section = &self.sections[order];
            let clustered = cluster_keywords(text, &section.keywords);
            if clustered.is_empty() {
                let err = ExtractError::SectionNotFound(format!("'{}' in {}", section.name, source));
                tracing::warn!("{}", err);
                continue;
            }
            tracing::debug!("Section '{}' recovered from keyword clusters", section.name);
            extracted.push((
                order,
                ExtractedSection {
                    name: section.name.clone(),
                    text: clustered,
                    method: ExtractionMethod::Keywords,
                },
            ));
        }

        extracted.retain(|(_, section)| {
            if section.text.len() < self.min_section_size {
                tracing::warn!(
                    "Section '{}' in {} is too small ({} bytes, required {})",
                    section.name,
                    source,
                    section.text.len(),
                    self.min_section_size
                );
                return false;
            }
            true
        });
        extracted.sort_by_key(|(order, _)| *order);
        extracted.into_iter().map(|(_, section)| section).collect()
    }
}
