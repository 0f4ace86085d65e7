use std::collections::HashSet;

pub const PREFIX_CHARS: usize = 60;
pub const SNIPPET_CHARS: usize = 300;
pub const MAX_CHARS: usize = 2000;

/// Drop near-duplicates and fit the rest into `max_chars`, using the default
/// 60-character prefix key and 300-character per-snippet cap.
pub fn deduplicate<S: AsRef<str>>(snippets: &[S], max_chars: usize) -> Vec<String> {
    deduplicate_with(snippets, max_chars, PREFIX_CHARS, SNIPPET_CHARS)
}

/// Walk `snippets` in order. A snippet whose first `prefix_chars` characters
/// were already emitted is skipped; survivors are cut to `snippet_chars`.
/// Stops at the first survivor that would push the total past `max_chars`.
///
/// Lengths are counted in characters. Blank snippets are ignored.
pub fn deduplicate_with<S: AsRef<str>>(
    snippets: &[S],
    max_chars: usize,
    prefix_chars: usize,
    snippet_chars: usize,
) -> Vec<String> {
    let keyed: Vec<(&str, &str)> = snippets.iter().map(|s| (s.as_ref(), s.as_ref())).collect();
    deduplicate_keyed(&keyed, max_chars, prefix_chars, snippet_chars)
}

/// Like [`deduplicate_with`], but the duplicate key is taken from the first
/// element of each pair while the second is what gets emitted, truncated and
/// counted against the budget. Pairs with a blank key are ignored.
pub fn deduplicate_keyed<K: AsRef<str>, S: AsRef<str>>(
    entries: &[(K, S)],
    max_chars: usize,
    prefix_chars: usize,
    snippet_chars: usize,
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut total = 0usize;
    for (key, snippet) in entries {
        let key = key.as_ref();
        if key.trim().is_empty() {
            continue;
        }
        let prefix: String = key.chars().take(prefix_chars).collect();
        if seen.contains(&prefix) {
            continue;
        }
        let clipped = truncate_chars(snippet.as_ref(), snippet_chars);
        let len = clipped.chars().count();
        if total + len > max_chars {
            break;
        }
        total += len;
        seen.insert(prefix);
        out.push(clipped.to_string());
    }
    out
}

pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
