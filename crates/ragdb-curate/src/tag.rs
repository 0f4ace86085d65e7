use ragdb_core::config::TagRuleSpec;
use ragdb_core::types::Record;

pub const GENERIC_TAG: &str = "Context";

/// Maps a source-identifier keyword to a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRule {
    keyword: String,
    label: String,
}

impl TagRule {
    pub fn new(keyword: impl Into<String>, label: impl Into<String>) -> Self {
        Self { keyword: keyword.into().to_lowercase(), label: label.into() }
    }

    pub fn label(&self) -> &str { &self.label }

    fn matches(&self, haystack: &str) -> bool {
        !self.keyword.is_empty() && haystack.contains(&self.keyword)
    }
}

impl From<&TagRuleSpec> for TagRule {
    fn from(spec: &TagRuleSpec) -> Self {
        Self::new(&spec.keyword, &spec.label)
    }
}

/// Rules used when the configuration supplies none. Order matters.
pub fn default_rules() -> Vec<TagRule> {
    vec![
        TagRule::new("counsel_chat", "Counseling Q&A"),
        TagRule::new("arabic_empathetic", "Empathetic Dialogue"),
        TagRule::new("legal", "Legal Text"),
        TagRule::new("law", "Legal Text"),
        TagRule::new("criteria", "Clinical Criteria"),
        TagRule::new("personality", "Personality Profile"),
        TagRule::new(".pdf", "Clinical Text"),
    ]
}

/// Human-readable provenance label for a record.
///
/// The first rule whose keyword occurs in `source` or `source_file`
/// (case-insensitive) wins. Otherwise the cleaned source identifier is used.
/// An `article_ref` field is prefixed as `"<ref> - <label>"`.
pub fn tag_for(record: &Record, rules: &[TagRule]) -> String {
    let source = Some(record.source.trim()).filter(|s| !s.is_empty()).or_else(|| record.field_str("source_file"));
    let haystack = [Some(record.source.as_str()), record.field_str("source_file")]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let label = rules
        .iter()
        .find(|rule| rule.matches(&haystack))
        .map(|rule| rule.label.clone())
        .or_else(|| source.map(clean_source).filter(|s| !s.is_empty()));

    match (record.field_str("article_ref"), label) {
        (Some(reference), Some(label)) => format!("{reference} - {label}"),
        (Some(reference), None) => reference.to_string(),
        (None, Some(label)) => label,
        (None, None) => GENERIC_TAG.to_string(),
    }
}

fn clean_source(source: &str) -> String {
    source.replace(".pdf", "").replace('_', " ").trim().to_string()
}
