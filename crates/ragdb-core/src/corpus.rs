//! Build-time corpus assembly.
//!
//! A [`Corpus`] is the only place ids are assigned: record `i` gets id `i` at
//! the moment it is pushed, and the same value later drives embedding order.
//! Vectors and metadata are therefore never assembled by separate loaders.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::Record;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 350, overlap_words: 60 }
    }
}

/// Ordered records with implicit, dense ids `0..len`.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<Record>,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    /// Append a record and return the id it now owns.
    pub fn push(&mut self, record: Record) -> u64 {
        self.records.push(record);
        (self.records.len() - 1) as u64
    }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn get(&self, id: u64) -> Option<&Record> {
        usize::try_from(id).ok().and_then(|i| self.records.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Record)> {
        self.records.iter().enumerate().map(|(i, r)| (i as u64, r))
    }

    /// Texts in id order, ready for batch embedding.
    pub fn texts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.text.clone()).collect()
    }

    pub fn into_records(self) -> Vec<Record> { self.records }
}

#[derive(Default)]
pub struct CorpusBuilder {
    chunking: ChunkingConfig,
}

impl CorpusBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunking(chunking: ChunkingConfig) -> Self { Self { chunking } }

    pub fn from_directory(&self, data_dir: &Path) -> Result<Corpus> {
        self.from_directory_limited(data_dir, usize::MAX)
    }

    pub fn from_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Corpus> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(Corpus::new());
        }
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited corpus to first files");
        }
        let mut corpus = Corpus::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing {}/{}", file_index + 1, files.len());
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(file_path);
            let category = self.get_facet_from_path(file_path, data_dir);
            let source = file_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| doc_id.clone());
            let chunks = self.chunk_words(&content);
            let total = chunks.len();
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                corpus.push(
                    Record::new(chunk, source.clone())
                        .with_field("doc_id", doc_id.clone())
                        .with_field("category", category.clone())
                        .with_field("chunk_index", chunk_index)
                        .with_field("total_chunks", total),
                );
            }
        }
        info!(files = files.len(), records = corpus.len(), "built corpus");
        Ok(corpus)
    }

    /// Chunk an in-memory sequence of passages sharing one source identifier.
    pub fn from_texts<I, S>(&self, source: &str, texts: I) -> Corpus
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corpus = Corpus::new();
        for text in texts {
            for chunk in self.chunk_words(text.as_ref()) {
                corpus.push(Record::new(chunk, source));
            }
        }
        corpus
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_doc_id(&self, file_path: &Path) -> String {
        file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string_lossy().to_string())
    }

    fn get_facet_from_path(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        match relative_path.parent().and_then(|p| p.to_str()) {
            Some(facet) if !facet.is_empty() => facet.to_string(),
            _ => "misc".to_string(),
        }
    }

    /// Word windows of `max_words` with `overlap_words` carried into the next
    /// window. Blank input yields no chunks.
    pub fn chunk_words(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let max = self.chunking.max_words.max(1);
        if words.len() <= max {
            return vec![words.join(" ")];
        }
        let overlap = self.chunking.overlap_words.min(max - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + max).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start = end - overlap;
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") {
                txt_files.push(path.to_path_buf());
            }
        }
        txt_files.sort();
        txt_files
    }
}
