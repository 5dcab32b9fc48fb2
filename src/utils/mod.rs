// src/utils/mod.rs
pub mod error;
pub mod logging;

pub use error::AppError; // Re-export main error type for convenience

/// Convert a string into a safe filesystem slug (`"Côte d'Ivoire"` -> `"c_te_d_ivoire"`).
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_was_sep = false;
    for ch in value.trim().to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    slug.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  Key Barriers -- 2024 "), "key_barriers_2024");
        assert_eq!(slugify("Côte d'Ivoire"), "c_te_d_ivoire");
        assert_eq!(slugify("!!!"), "");
    }
}
