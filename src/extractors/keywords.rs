// src/extractors/keywords.rs

/// Marked lines this close together (in line indices) belong to one cluster.
const CLUSTER_GAP: usize = 2;
/// Lines of context kept on each side of a cluster.
const CONTEXT_LINES: usize = 5;

/// Returns the `(first, last)` line windows (inclusive) around keyword hits.
///
/// Lines containing any keyword (case-insensitive substring) are clustered when
/// consecutive hits are at most `CLUSTER_GAP` lines apart; each cluster is then
/// widened by `CONTEXT_LINES` on both sides. Windows that overlap after widening
/// are merged, so every line appears in at most one window.
pub fn keyword_windows(lines: &[&str], keywords: &[String]) -> Vec<(usize, usize)> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .collect();
    if needles.is_empty() || lines.is_empty() {
        return Vec::new();
    }

    let hits: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let lower = line.to_lowercase();
            needles.iter().any(|kw| lower.contains(kw.as_str()))
        })
        .map(|(idx, _)| idx)
        .collect();

    let mut clusters: Vec<(usize, usize)> = Vec::new();
    for idx in hits {
        match clusters.last_mut() {
            Some((_, last)) if idx - *last <= CLUSTER_GAP => *last = idx,
            _ => clusters.push((idx, idx)),
        }
    }

    let last_line = lines.len() - 1;
    let mut windows: Vec<(usize, usize)> = Vec::with_capacity(clusters.len());
    for (first, last) in clusters {
        let start = first.saturating_sub(CONTEXT_LINES);
        let end = (last + CONTEXT_LINES).min(last_line);
        match windows.last_mut() {
            Some((_, prev_end)) if start <= *prev_end => *prev_end = (*prev_end).max(end),
            _ => windows.push((start, end)),
        }
    }
    windows
}

/// Keyword-proximity fallback for sections without a recognisable heading.
/// Returns the context around every keyword cluster, windows separated by a
/// blank line, or an empty string when no line mentions a keyword.
pub fn cluster_keywords(text: &str, keywords: &[String]) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let windows = keyword_windows(&lines, keywords);
    tracing::trace!("Keyword fallback produced {} window(s)", windows.len());

    windows
        .iter()
        .map(|&(start, end)| lines[start..=end].join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("filler line {}", i)).collect()
    }

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_close_hits_form_one_cluster() {
        let mut lines = numbered_lines(40);
        lines[10] = "Climate finance received".into();
        lines[12] = "More CLIMATE FINANCE here".into();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();

        let windows = keyword_windows(&refs, &kw(&["climate finance"]));
        assert_eq!(windows, vec![(5, 17)]);
    }

    #[test]
    fn test_distant_hits_form_separate_windows() {
        let mut lines = numbered_lines(60);
        lines[10] = "support received".into();
        lines[40] = "support received again".into();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();

        let windows = keyword_windows(&refs, &kw(&["support received"]));
        assert_eq!(windows, vec![(5, 15), (35, 45)]);
    }

    #[test]
    fn test_overlapping_context_windows_are_merged() {
        // Gap of 6 lines: separate clusters, but their context windows overlap
        let mut lines = numbered_lines(40);
        lines[10] = "baseline analysis".into();
        lines[16] = "baseline analysis".into();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();

        let windows = keyword_windows(&refs, &kw(&["baseline analysis"]));
        assert_eq!(windows, vec![(5, 21)]);

        let text = lines.join("\n");
        let out = cluster_keywords(&text, &kw(&["baseline analysis"]));
        assert_eq!(out.matches("filler line 12").count(), 1);
    }

    #[test]
    fn test_windows_clamp_to_document_bounds() {
        let lines = vec!["ndc tracking", "a", "b"];
        assert_eq!(keyword_windows(&lines, &kw(&["NDC tracking"])), vec![(0, 2)]);
    }

    #[test]
    fn test_output_joins_windows_with_blank_line() {
        let mut lines = numbered_lines(30);
        lines[0] = "support needed".into();
        lines[25] = "support needed".into();
        let text = lines.join("\n");

        let out = cluster_keywords(&text, &kw(&["support needed"]));
        let expected_first = lines[0..=5].join("\n");
        let expected_second = lines[20..=29].join("\n");
        assert_eq!(out, format!("{}\n\n{}", expected_first, expected_second));
    }

    #[test]
    fn test_no_keyword_yields_empty_output() {
        let text = "nothing relevant\nat all";
        assert_eq!(cluster_keywords(text, &kw(&["climate finance"])), "");
        assert_eq!(cluster_keywords(text, &[]), "");
        assert_eq!(cluster_keywords(text, &kw(&["   "])), "");
    }
}
