//! Team-name slugging.
//!
//! Slugs are the cross-system team key: declared team names are slugged
//! before being compared with live team slugs, and team references inside
//! repositories are slugged the same way.

/// Produce the URL-safe slug of a team or repository name.
///
/// Deterministic and pure: lowercases ASCII alphanumerics, collapses any
/// other run of characters into a single `-`, and never emits a leading or
/// trailing `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_lowercases() {
        assert_eq!(slugify("Platform"), "platform");
        assert_eq!(slugify("SRE"), "sre");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Data  Platform"), "data-platform");
        assert_eq!(slugify("ops/infra"), "ops-infra");
        assert_eq!(slugify("a_b.c"), "a-b-c");
    }

    #[test]
    fn test_slugify_trims_edges() {
        assert_eq!(slugify("  edge  "), "edge");
        assert_eq!(slugify("--x--"), "x");
    }

    #[test]
    fn test_slugify_keeps_digits() {
        assert_eq!(slugify("Team 42"), "team-42");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        let once = slugify("Core Services");
        assert_eq!(slugify(&once), once);
    }
}
