use proptest::prelude::*;

use ragdb_core::config::IntegrityMode;
use ragdb_core::corpus::CorpusBuilder;
use ragdb_core::traits::{Encoder, VectorIndex};
use ragdb_core::types::{Record, UnitVector};
use ragdb_core::Error;
use ragdb_embed::FakeEncoder;
use ragdb_vector::artifact::{self, ArtifactError};
use ragdb_vector::integrity;
use ragdb_vector::{Collection, FlatIndex, IndexCatalog, MetadataStore, Metric, Retriever};

fn unit(v: &[f32]) -> UnitVector {
    UnitVector::normalize(v.to_vec()).unwrap()
}

fn records(n: usize) -> MetadataStore {
    MetadataStore::new((0..n).map(|i| Record::new(format!("passage {i}"), "notes.txt")).collect())
}

/// Query [1,0,0] scores 1.0, 0.0 and -1.0 against these.
fn axis_collection(name: &str) -> Collection {
    let vectors = vec![unit(&[1.0, 0.0, 0.0]), unit(&[0.0, 1.0, 0.0]), unit(&[-1.0, 0.0, 0.0])];
    let index = FlatIndex::from_vectors(Metric::InnerProduct, 3, vectors).unwrap();
    Collection::from_parts(name, index, records(3)).unwrap()
}

const PASSAGES: [&str; 4] = [
    "alpha beta gamma delta",
    "river mountain forest valley",
    "contract tenant landlord deposit",
    "sleep routine evening relaxation",
];

fn built(name: &str, encoder: &FakeEncoder) -> Collection {
    let corpus = CorpusBuilder::new().from_texts("notes.txt", PASSAGES);
    Collection::build(name, &corpus, encoder, Metric::InnerProduct).unwrap()
}

proptest! {
    #[test]
    fn similarity_is_inner_product_for_both_metrics(
        a in prop::collection::vec(-1.0f32..1.0, 8),
        b in prop::collection::vec(-1.0f32..1.0, 8),
    ) {
        let (Ok(a), Ok(b)) = (UnitVector::normalize(a), UnitVector::normalize(b)) else {
            return Ok(());
        };
        let expected = a.dot(&b);
        for metric in [Metric::InnerProduct, Metric::NormalizedDistance] {
            let index = FlatIndex::new(metric, 8, vec![(0, b.clone())]).unwrap();
            let got = index.top_candidates(&a, 1);
            prop_assert_eq!(got.len(), 1);
            prop_assert!((got[0].score - expected).abs() < 1e-5, "{:?}: {} vs {}", metric, got[0].score, expected);
        }
    }
}

#[test]
fn candidates_rank_by_score_then_id() {
    let v = unit(&[0.0, 1.0]);
    let entries = vec![(7, v.clone()), (2, v.clone()), (5, unit(&[1.0, 0.0])), (3, v)];
    let index = FlatIndex::new(Metric::NormalizedDistance, 2, entries).unwrap();
    let ids: Vec<u64> = index.top_candidates(&unit(&[0.0, 1.0]), 4).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 3, 7, 5]);
    assert_eq!(index.top_candidates(&unit(&[0.0, 1.0]), 2).len(), 2);
    assert!(index.top_candidates(&unit(&[0.0, 1.0]), 0).is_empty());
}

#[test]
fn flat_index_rejects_bad_entries() {
    let err = FlatIndex::new(Metric::InnerProduct, 2, vec![(0, unit(&[1.0, 0.0])), (0, unit(&[0.0, 1.0]))]).unwrap_err();
    assert_eq!(err, ragdb_vector::index::IndexError::DuplicateId(0));
    assert!(FlatIndex::new(Metric::InnerProduct, 3, vec![(0, unit(&[1.0, 0.0]))]).is_err());
}

#[test]
fn retriever_drops_scores_at_or_below_threshold_without_padding() {
    let collection = axis_collection("axes");
    let retriever = Retriever::new(0.0, 3);
    let hits = retriever.search_collection(&collection, &unit(&[1.0, 0.0, 0.0]), 5, None).unwrap();
    assert_eq!(hits.len(), 1, "0.0 is not strictly above the threshold");
    assert_eq!(hits[0].id, 0);
    assert_eq!(hits[0].origin, "axes");
    assert_eq!(hits[0].record.text, "passage 0");

    let loose = retriever.search_collection(&collection, &unit(&[1.0, 0.0, 0.0]), 5, Some(-0.5)).unwrap();
    let ids: Vec<u64> = loose.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn retriever_caps_at_k_and_handles_zero() {
    let collection = axis_collection("axes");
    let retriever = Retriever::new(-2.0, 3);
    let q = unit(&[1.0, 1.0, 0.0]);
    let top = retriever.search_collection(&collection, &q, 2, None).unwrap();
    assert_eq!(top.len(), 2);
    assert!(top[0].score >= top[1].score);
    assert!(retriever.search_collection(&collection, &q, 0, None).unwrap().is_empty());
}

#[test]
fn retriever_reports_unknown_index_and_dim_mismatch() {
    let mut catalog = IndexCatalog::new();
    catalog.insert(axis_collection("axes")).unwrap();
    let retriever = Retriever::default();

    let err = retriever.search(&catalog, &unit(&[1.0, 0.0, 0.0]), 3, "missing", None).unwrap_err();
    assert!(matches!(err, Error::IndexNotFound(ref n) if n == "missing"));

    let err = retriever.search(&catalog, &unit(&[1.0, 0.0]), 3, "axes", None).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
}

#[test]
fn count_mismatch_fails_to_load() {
    let vectors = vec![unit(&[1.0, 0.0]), unit(&[0.0, 1.0]), unit(&[1.0, 1.0])];
    let index = FlatIndex::from_vectors(Metric::InnerProduct, 2, vectors).unwrap();
    let err = Collection::from_parts("short", index, records(2)).unwrap_err();
    assert!(matches!(err, Error::Load { ref collection, .. } if collection == "short"));
    assert!(err.is_fatal());
}

#[test]
fn id_outside_metadata_range_fails_to_load() {
    let index = FlatIndex::new(Metric::InnerProduct, 2, vec![(0, unit(&[1.0, 0.0])), (9, unit(&[0.0, 1.0]))]).unwrap();
    let err = Collection::from_parts("gappy", index, records(2)).unwrap_err();
    assert!(err.to_string().contains("vector id 9"));
}

#[test]
fn build_write_load_keeps_pairing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let encoder = FakeEncoder::new(64);
    let collection = built("notes", &encoder);
    let index_path = tmp.path().join("idx/notes.rvx");
    let meta_path = tmp.path().join("idx/notes.json");
    collection.write(&index_path, &meta_path)?;

    let loaded = Collection::load("notes", &index_path, &meta_path)?;
    assert_eq!(loaded.size(), PASSAGES.len());
    assert_eq!(loaded.dim(), 64);
    for (id, text) in PASSAGES.iter().enumerate() {
        assert_eq!(loaded.record(id as u64).map(|r| r.text.as_str()), Some(*text));
    }

    let query = UnitVector::normalize(encoder.encode(PASSAGES[2])?)?;
    let hits = Retriever::default().search_collection(&loaded, &query, 1, None)?;
    assert_eq!(hits[0].record.text, PASSAGES[2]);
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn load_with_fewer_records_than_vectors_fails() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index_path = tmp.path().join("a.rvx");
    let meta_path = tmp.path().join("a.json");
    let vectors: Vec<(u64, Vec<f32>)> = (0..3u64).map(|i| (i, vec![1.0, i as f32])).collect();
    artifact::write_index(&index_path, Metric::InnerProduct, 2, vectors.iter().map(|(i, v)| (*i, v.as_slice())))?;
    std::fs::write(&meta_path, r#"[{"text": "one"}, {"text": "two"}]"#)?;

    let err = Collection::load("a", &index_path, &meta_path).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
    assert!(err.to_string().contains("3 vectors"));
    Ok(())
}

#[test]
fn stored_vectors_are_renormalized() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index_path = tmp.path().join("raw.rvx");
    let meta_path = tmp.path().join("raw.json");
    let raw = [3.0f32, 4.0];
    artifact::write_index(&index_path, Metric::NormalizedDistance, 2, std::iter::once((0u64, &raw[..])))?;
    std::fs::write(&meta_path, r#"[{"page_content": "three four", "source_file": "numbers.pdf"}]"#)?;

    let loaded = Collection::load("raw", &index_path, &meta_path)?;
    let v = loaded.index().vector_at(0).unwrap().as_slice().to_vec();
    assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    assert_eq!(loaded.metric(), Metric::NormalizedDistance);
    let record = loaded.record(0).unwrap();
    assert_eq!(record.text, "three four");
    assert_eq!(record.source, "numbers.pdf");
    Ok(())
}

#[test]
fn artifact_rejects_garbage() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("junk.rvx");
    std::fs::write(&path, b"NOPE and some more bytes")?;
    assert!(matches!(artifact::read_index(&path), Err(ArtifactError::BadMagic)));

    let mut bytes = Vec::new();
    let v = [1.0f32, 0.0];
    artifact::encode(&mut bytes, Metric::InnerProduct, 2, std::iter::once((0u64, &v[..])))?;
    bytes.truncate(bytes.len() - 2);
    assert!(matches!(artifact::decode(&mut bytes.as_slice()), Err(ArtifactError::Truncated(_))));

    let meta = tmp.path().join("junk.json");
    std::fs::write(&meta, "[]")?;
    assert!(matches!(Collection::load("junk", &path, &meta), Err(Error::Load { .. })));
    Ok(())
}

#[test]
fn metadata_accepts_profiles_and_field_fallbacks() {
    let json = serde_json::json!({
        "profiles": [
            {"text": "first", "source": "counsel_chat.csv", "topic": "grief"},
            {"definition": "a trait", "source_file": "criteria_doc.pdf"},
            {"page_content": "article body", "article_ref": "Art. 12", "pdf_page": 4}
        ]
    });
    let store = MetadataStore::from_json(json).unwrap();
    assert_eq!(store.len(), 3);
    let first = store.get(0).unwrap();
    assert_eq!(first.source, "counsel_chat.csv");
    assert_eq!(first.field_str("topic"), Some("grief"));
    let second = store.get(1).unwrap();
    assert_eq!(second.text, "a trait");
    assert_eq!(second.source, "criteria_doc.pdf");
    let third = store.get(2).unwrap();
    assert_eq!(third.text, "article body");
    assert_eq!(third.field_str("article_ref"), Some("Art. 12"));
    assert!(!third.fields.contains_key("page_content"));

    assert!(MetadataStore::from_json(serde_json::json!({"items": []})).is_err());
    assert!(MetadataStore::from_json(serde_json::json!([1, 2])).is_err());
}

#[test]
fn definition_text_writes_back_with_a_single_text_key() -> anyhow::Result<()> {
    let store = MetadataStore::from_json(serde_json::json!([
        {"text": null, "page_content": 7, "definition": "avoidant attachment", "source_file": "criteria.pdf"}
    ]))?;
    let record = store.get(0).unwrap();
    assert_eq!(record.text, "avoidant attachment");
    assert_eq!(record.field_str("definition"), Some("avoidant attachment"));
    assert!(!record.fields.contains_key("text"));
    assert!(!record.fields.contains_key("page_content"));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("meta.json");
    store.write(&path)?;
    let written = std::fs::read_to_string(&path)?;
    assert_eq!(written.matches("\"text\"").count(), 1);
    assert_eq!(MetadataStore::load(&path)?.get(0).unwrap().text, "avoidant attachment");
    Ok(())
}

#[test]
fn spot_check_passes_for_aligned_collection() {
    let encoder = FakeEncoder::new(64);
    let collection = built("notes", &encoder);
    let report = integrity::verify(&collection, &encoder, IntegrityMode::Enforce, 8, 0.5).unwrap().unwrap();
    assert_eq!(report.checked, PASSAGES.len());
    assert!(report.passed());
    assert!(integrity::verify(&collection, &encoder, IntegrityMode::Off, 8, 0.5).unwrap().is_none());
}

#[test]
fn spot_check_catches_shifted_metadata() {
    let encoder = FakeEncoder::new(64);
    let vectors = PASSAGES.iter().map(|p| UnitVector::normalize(encoder.encode(p).unwrap()).unwrap()).collect();
    let index = FlatIndex::from_vectors(Metric::InnerProduct, 64, vectors).unwrap();
    // Records rotated by one: same count, wrong pairing.
    let mut texts: Vec<&str> = PASSAGES.to_vec();
    texts.rotate_left(1);
    let store = MetadataStore::new(texts.iter().map(|t| Record::new(*t, "notes.txt")).collect());
    let collection = Collection::from_parts("shifted", index, store).unwrap();

    let report = integrity::verify(&collection, &encoder, IntegrityMode::Advisory, 8, 0.5).unwrap().unwrap();
    assert!(!report.passed());
    assert_eq!(report.mismatches[0].id, 0);
    assert_eq!(report.mismatches[0].nearest, 1);

    let err = integrity::verify(&collection, &encoder, IntegrityMode::Enforce, 8, 0.5).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
}

/// Reports the right dimension but cannot embed anything yet.
struct ColdEncoder;

impl Encoder for ColdEncoder {
    fn id(&self) -> &str { "cold" }
    fn dim(&self) -> usize { 64 }
    fn encode(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("model warming up")
    }
}

#[test]
fn spot_check_encoder_failure_only_warns_when_advisory() {
    let collection = built("notes", &FakeEncoder::new(64));

    let report = integrity::verify(&collection, &ColdEncoder, IntegrityMode::Advisory, 8, 0.5).unwrap().unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(report.unchecked, PASSAGES.len());
    assert!(report.mismatches.is_empty());
    assert!(!report.passed());

    let err = integrity::verify(&collection, &ColdEncoder, IntegrityMode::Enforce, 8, 0.5).unwrap_err();
    assert!(matches!(err, Error::Load { ref reason, .. } if reason.contains("could not be re-embedded")));
}

#[test]
fn catalog_rejects_duplicates_and_mixed_dimensions() {
    let mut catalog = IndexCatalog::new();
    catalog.insert(axis_collection("axes")).unwrap();
    assert!(matches!(catalog.insert(axis_collection("axes")), Err(Error::InvalidConfig(_))));

    let encoder = FakeEncoder::new(64);
    assert!(matches!(catalog.insert(built("notes", &encoder)), Err(Error::Load { .. })));
    assert_eq!(catalog.names(), ["axes".to_string()]);
}

#[test]
fn sample_ids_are_strided_and_bounded() {
    assert_eq!(integrity::sample_ids(10, 3), vec![0, 3, 6]);
    assert_eq!(integrity::sample_ids(2, 8), vec![0, 1]);
    assert!(integrity::sample_ids(0, 8).is_empty());
}
