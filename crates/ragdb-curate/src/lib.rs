//! Post-processing of ranked results: provenance tags, near-duplicate removal
//! under a character budget, and the adaptive result count.

use tracing::debug;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::types::SearchResult;

pub mod dedup;
pub mod policy;
pub mod tag;

pub use dedup::{deduplicate, deduplicate_keyed, deduplicate_with, truncate_chars};
pub use policy::dynamic_k;
pub use tag::{default_rules, tag_for, TagRule};

/// Rendered in place of retrieved context when nothing usable came back.
pub const NO_CONTEXT: &str = "(No contextual knowledge available.)";

/// `- [<tag>] <text>` on a single line.
pub fn format_snippet(tag: &str, text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("- [{tag}] {flat}")
}

/// Newline-joined snippets, or [`NO_CONTEXT`] when there are none.
pub fn render_context<S: AsRef<str>>(snippets: &[S]) -> String {
    if snippets.is_empty() {
        return NO_CONTEXT.to_string();
    }
    snippets.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Clone)]
pub struct ResultCurator {
    max_chars: usize,
    snippet_chars: usize,
    prefix_chars: usize,
    rules: Vec<TagRule>,
}

impl Default for ResultCurator {
    fn default() -> Self {
        Self {
            max_chars: dedup::MAX_CHARS,
            snippet_chars: dedup::SNIPPET_CHARS,
            prefix_chars: dedup::PREFIX_CHARS,
            rules: default_rules(),
        }
    }
}

impl ResultCurator {
    pub fn new(max_chars: usize, rules: Vec<TagRule>) -> Self {
        Self { max_chars, rules, ..Self::default() }
    }

    /// Budgets from settings; configured tag rules replace the defaults.
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        let rules = if settings.tag_rules.is_empty() {
            default_rules()
        } else {
            settings.tag_rules.iter().map(TagRule::from).collect()
        };
        Self {
            max_chars: settings.max_chars,
            snippet_chars: settings.snippet_chars,
            prefix_chars: settings.prefix_chars,
            rules,
        }
    }

    pub fn max_chars(&self) -> usize { self.max_chars }

    pub fn rules(&self) -> &[TagRule] { &self.rules }

    pub fn tag(&self, result: &SearchResult) -> String {
        tag_for(&result.record, &self.rules)
    }

    /// Tagged, deduplicated snippet lines in result order, within budget.
    ///
    /// Duplicates are judged on the passage text, so the same passage found
    /// under two differently tagged sources is emitted once. Truncation and
    /// the budget apply to the rendered line.
    pub fn curate(&self, results: &[SearchResult]) -> Vec<String> {
        let entries: Vec<(String, String)> = results
            .iter()
            .map(|r| {
                let flat = r.record.text.split_whitespace().collect::<Vec<_>>().join(" ");
                let line = format_snippet(&self.tag(r), &flat);
                (flat, line)
            })
            .collect();
        let kept = deduplicate_keyed(&entries, self.max_chars, self.prefix_chars, self.snippet_chars);
        debug!(results = results.len(), kept = kept.len(), "curated snippets");
        kept
    }

    pub fn render(&self, results: &[SearchResult]) -> String {
        render_context(&self.curate(results))
    }
}
