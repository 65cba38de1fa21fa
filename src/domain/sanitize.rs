//! Cleanup rules for generated titles and tag strings before they reach the
//! song service.

/// Character budget for the comma-joined tag string.
pub const TAG_BUDGET: usize = 100;

fn is_allowed(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == ',' || ch == '-' || ch.is_whitespace()
}

/// Strip every character outside the allow-list and trim the result.
pub fn sanitize_title(raw: &str) -> String {
    raw.trim().chars().filter(|ch| is_allowed(*ch)).collect::<String>().trim().to_string()
}

/// Sanitize a comma-separated tag list and keep as many leading tags as fit
/// in `budget` characters, commas included.
///
/// Tags are never cut mid-entry: the first tag that would overflow the budget
/// ends the list.
pub fn sanitize_tags(raw: &str, budget: usize) -> String {
    let cleaned: String = raw.trim().chars().filter(|ch| is_allowed(*ch)).collect();

    let mut output = String::new();
    for tag in cleaned.split(',').map(str::trim).filter(|tag| !tag.is_empty()) {
        let separator = usize::from(!output.is_empty());
        if output.len() + separator + tag.len() > budget {
            break;
        }
        if separator == 1 {
            output.push(',');
        }
        output.push_str(tag);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_drops_disallowed_characters() {
        assert_eq!(sanitize_title("  \"Midnight Rain!\" (v2)  "), "Midnight Rain v2");
        assert_eq!(sanitize_title("Café – Lo-Fi"), "Caf  Lo-Fi");
    }

    #[test]
    fn tags_keep_only_allowed_characters() {
        let tags = sanitize_tags("Calm LO-FI!, gentle piano*, smooth beats.", TAG_BUDGET);
        assert_eq!(tags, "Calm LO-FI,gentle piano,smooth beats");
        assert!(tags.chars().all(is_allowed));
    }

    #[test]
    fn tags_never_exceed_budget_and_drop_whole_entries() {
        let tags = sanitize_tags("alpha, bravo, charlie, delta", 20);
        assert_eq!(tags, "alpha,bravo,charlie");
        assert!(tags.len() <= 20);

        let tags = sanitize_tags("alpha, bravo, charlie, delta", 18);
        assert_eq!(tags, "alpha,bravo");
    }

    #[test]
    fn later_short_tags_do_not_backfill_after_overflow() {
        let tags = sanitize_tags("one, a-very-long-tag-name, two", 12);
        assert_eq!(tags, "one");
    }

    #[test]
    fn oversized_first_tag_yields_empty_string() {
        assert_eq!(sanitize_tags("abcdefghij", 5), "");
        assert_eq!(sanitize_tags("", TAG_BUDGET), "");
        assert_eq!(sanitize_tags(" , ,, ", TAG_BUDGET), "");
    }

    #[test]
    fn long_generated_tag_lists_stay_within_budget() {
        let raw = (0..60)
            .map(|idx| format!("Tag Number {idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let tags = sanitize_tags(&raw, TAG_BUDGET);
        assert!(tags.len() <= TAG_BUDGET);
        assert!(tags.split(',').all(|tag| tag.starts_with("Tag Number ")));
    }
}
