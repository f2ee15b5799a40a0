//! End-to-end tests: chunk, index, retrieve and answer over a small corpus

mod common;

use ndarray::Array2;
use std::sync::Arc;

use common::{FailingEmbedder, Fixture, KeywordEmbedder, ScriptedLlm, KEYWORDS};
use taxact_rag::config::{BackendKind, FilterPolicy};
use taxact_rag::generation::AnswerGenerator;
use taxact_rag::index::{
    BuildTargets, ChunkCollection, FlatIndex, IndexBuilder, IndexLayout, IndexManifest,
};
use taxact_rag::ingestion::ChunkStore;
use taxact_rag::retrieval::Retriever;
use taxact_rag::types::{FailureKind, ResultId, SectionType};
use taxact_rag::{Error, MetadataFilter, QueryRequest, RagPipeline};

const VAT_ANSWER: &str = "VAT is charged at 7.5% of the value of taxable supplies.";

#[tokio::test]
async fn test_vat_rate_question_is_answered_with_citation() {
    let fixture = Fixture::build().await;
    let llm = ScriptedLlm::answering(VAT_ANSWER);
    let pipeline = fixture.pipeline(BackendKind::Flat, FilterPolicy::WarnAndIgnore, llm.clone());

    let result = pipeline
        .query(&QueryRequest::new("What is the VAT rate?").with_top_k(2))
        .await;

    assert!(!result.generation.is_failed());
    assert_eq!(result.answer(), VAT_ANSWER);
    assert_eq!(result.model(), "scripted-llm");
    assert_eq!(result.retrieved_chunks, 2);
    assert_eq!(result.sources.len(), 2);

    let top = &result.sources[0];
    assert_eq!(top.document, "VAT Act 2025");
    assert_eq!(top.section, "146");
    assert_eq!(top.title, "Rate of tax");
    assert_eq!(top.pages, "88-88");
    assert_eq!(top.section_type, "section");

    assert!(result
        .formatted_sources
        .starts_with("Sources:\n1. VAT Act 2025 Section 146 - Rate of tax (Pages 88-88)"));

    let prompt = llm.last_user_prompt().expect("prompt sent");
    assert!(prompt.contains("What is the VAT rate?"));
    assert!(prompt.contains("[Source 1] VAT Act 2025 - Section 146"));
    assert!(prompt.contains("7.5%"));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_both_backends_rank_the_same_chunks() {
    let fixture = Fixture::build().await;
    let flat = fixture.pipeline(
        BackendKind::Flat,
        FilterPolicy::WarnAndIgnore,
        ScriptedLlm::answering(VAT_ANSWER),
    );
    let collection = fixture.pipeline(
        BackendKind::Collection,
        FilterPolicy::WarnAndIgnore,
        ScriptedLlm::answering(VAT_ANSWER),
    );

    let from_flat = flat.search("What is the VAT rate?", None, Some(4)).await.unwrap();
    let from_collection = collection
        .search("What is the VAT rate?", None, Some(4))
        .await
        .unwrap();

    assert_eq!(from_flat.len(), 4);
    assert_eq!(from_collection.len(), 4);
    for (a, b) in from_flat.iter().zip(&from_collection) {
        assert_eq!(a.text, b.text);
        assert!((a.distance - b.distance).abs() < 1e-6);
    }

    assert_eq!(from_flat[0].id, ResultId::Ordinal(0));
    assert_eq!(from_collection[0].id, ResultId::Key("chunk_0".to_string()));
}

#[tokio::test]
async fn test_results_are_ordered_by_distance() {
    let fixture = Fixture::build().await;
    let pipeline = fixture.pipeline(
        BackendKind::Flat,
        FilterPolicy::WarnAndIgnore,
        ScriptedLlm::answering(VAT_ANSWER),
    );

    let results = pipeline
        .search("What is the VAT rate?", None, Some(10))
        .await
        .unwrap();

    // Larger k than the corpus returns every chunk
    assert_eq!(results.len(), fixture.chunks.len());
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(results[0].distance, 0.0);
    assert_eq!(results[1].metadata.section_title, "Exempt supplies");

    // Equal distances keep corpus order
    assert_eq!(results[2].metadata.section_title, "Employment income");
    assert_eq!(results[3].metadata.section_title, "Chargeable gains");
}

#[tokio::test]
async fn test_collection_filters_are_applied_exactly() {
    let fixture = Fixture::build().await;
    let pipeline = fixture.pipeline(
        BackendKind::Collection,
        FilterPolicy::Reject,
        ScriptedLlm::answering(VAT_ANSWER),
    );

    let schedules = MetadataFilter::new().eq("section_type", "schedule");
    let results = pipeline
        .search("What is the VAT rate?", Some(&schedules), Some(5))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.section_type, SectionType::Schedule);

    let nta_rates = MetadataFilter::new()
        .eq("document_name", "Nigeria Tax Act 2025")
        .eq("contains_rate", true);
    let results = pipeline
        .search("What is the VAT rate?", Some(&nta_rates), Some(5))
        .await
        .unwrap();
    assert!(results.is_empty());

    let unknown = MetadataFilter::new().eq("jurisdiction", "lagos");
    let err = pipeline
        .search("What is the VAT rate?", Some(&unknown), Some(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFilter(_)));
}

#[tokio::test]
async fn test_filters_on_flat_backend_follow_policy() {
    let fixture = Fixture::build().await;
    let schedules = MetadataFilter::new().eq("section_type", "schedule");

    let lenient = fixture.pipeline(
        BackendKind::Flat,
        FilterPolicy::WarnAndIgnore,
        ScriptedLlm::answering(VAT_ANSWER),
    );
    let results = lenient
        .search("What is the VAT rate?", Some(&schedules), Some(2))
        .await
        .unwrap();
    assert_eq!(results[0].metadata.section_number, "146");

    let llm = ScriptedLlm::answering(VAT_ANSWER);
    let strict = fixture.pipeline(BackendKind::Flat, FilterPolicy::Reject, llm.clone());
    let result = strict
        .query(&QueryRequest::new("What is the VAT rate?").with_filters(schedules))
        .await;

    let error = result.generation.error().expect("rejected");
    assert_eq!(error.kind, FailureKind::UnsupportedFilter);
    assert_eq!(result.retrieved_chunks, 0);
    assert!(result.sources.is_empty());
    assert_eq!(result.formatted_sources, "No sources available.");
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_provider_failure_is_contained() {
    let fixture = Fixture::build().await;
    let pipeline = fixture.pipeline(
        BackendKind::Flat,
        FilterPolicy::WarnAndIgnore,
        ScriptedLlm::failing("connection refused"),
    );

    let result = pipeline
        .query(&QueryRequest::new("What is the VAT rate?").with_top_k(3))
        .await;

    let error = result.generation.error().expect("failed generation");
    assert_eq!(error.kind, FailureKind::Provider);
    assert!(error.message.contains("connection refused"));
    assert!(result.answer().starts_with("Error generating answer:"));
    assert_eq!(result.finish_reason(), "error");
    assert!(result.usage().is_none());

    // Retrieval succeeded, so citations are still reported
    assert_eq!(result.retrieved_chunks, 3);
    assert_eq!(result.sources.len(), 3);
}

#[tokio::test]
async fn test_query_embedding_failure_is_contained() {
    let fixture = Fixture::build().await;
    let config = fixture.config(BackendKind::Collection, FilterPolicy::WarnAndIgnore);
    let retriever = Retriever::from_config(&config, Arc::new(FailingEmbedder)).unwrap();
    let llm = ScriptedLlm::answering(VAT_ANSWER);
    let pipeline = RagPipeline::new(retriever, AnswerGenerator::new(llm.clone()));

    let result = pipeline.query(&QueryRequest::new("What is the VAT rate?")).await;

    let error = result.generation.error().expect("failed retrieval");
    assert_eq!(error.kind, FailureKind::Retrieval);
    assert_eq!(result.retrieved_chunks, 0);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_top_k_is_per_call() {
    let fixture = Fixture::build().await;
    let pipeline = fixture.pipeline(
        BackendKind::Flat,
        FilterPolicy::WarnAndIgnore,
        ScriptedLlm::answering(VAT_ANSWER),
    );

    let one = QueryRequest::new("What is the VAT rate?").with_top_k(1);
    let three = QueryRequest::new("Is PAYE deducted from employment income?").with_top_k(3);
    let (a, b) = tokio::join!(pipeline.query(&one), pipeline.query(&three));

    assert_eq!(a.retrieved_chunks, 1);
    assert_eq!(b.retrieved_chunks, 3);
    assert_eq!(b.sources[0].title, "Employment income");

    let default = pipeline.query(&QueryRequest::new("What is the VAT rate?")).await;
    assert_eq!(default.retrieved_chunks, 4);
    assert_eq!(pipeline.retriever().default_top_k(), 5);
}

#[tokio::test]
async fn test_artifacts_agree_on_dimension_and_count() {
    let fixture = Fixture::build().await;
    let layout = IndexLayout::new(&fixture.config.paths.embeddings_dir);
    let manifest = IndexManifest::load(&layout.manifest()).unwrap();

    assert_eq!(manifest.dimension, KEYWORDS.len());
    assert_eq!(manifest.total_chunks, fixture.chunks.len());
    assert_eq!(manifest.embedding_model, "keyword");
    assert_eq!(manifest.degraded_batches, 0);
    assert_eq!(fixture.build.manifest.dimension, manifest.dimension);

    let flat = FlatIndex::load(&layout.flat_index()).unwrap();
    assert_eq!(flat.len(), fixture.chunks.len());
    assert_eq!(flat.dimension(), manifest.dimension);

    let matrix: Array2<f32> = ndarray_npy::read_npy(layout.embeddings()).unwrap();
    assert_eq!(matrix.dim(), (fixture.chunks.len(), manifest.dimension));
    for (row, chunk) in matrix.rows().into_iter().zip(&fixture.chunks) {
        assert_eq!(row.to_vec(), KeywordEmbedder::vector(&chunk.text));
    }

    let collection = ChunkCollection::open_existing(&layout.collection()).unwrap();
    assert_eq!(collection.count().unwrap(), fixture.chunks.len());
    assert_eq!(collection.dimension().unwrap(), Some(manifest.dimension));

    let stored = ChunkStore::new(fixture.config.paths.chunks_file())
        .read_all()
        .unwrap();
    assert_eq!(stored, fixture.chunks);
}

#[tokio::test]
async fn test_missing_artifacts_are_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = common::config_for(dir.path(), BackendKind::Flat, FilterPolicy::WarnAndIgnore);

    let err = Retriever::from_config(&config, KeywordEmbedder::new()).unwrap_err();
    assert!(matches!(err, Error::MissingArtifact { .. }));
}

#[tokio::test]
async fn test_partial_rebuild_does_not_serve_previous_generation() {
    let fixture = Fixture::build().await;
    let kept = &fixture.chunks[..1];
    ChunkStore::new(fixture.config.paths.chunks_file())
        .write_all(kept)
        .unwrap();
    IndexBuilder::new(
        KeywordEmbedder::new(),
        IndexLayout::new(&fixture.config.paths.embeddings_dir),
    )
    .with_targets(BuildTargets::Flat)
    .build(kept)
    .await
    .unwrap();

    let config = fixture.config(BackendKind::Collection, FilterPolicy::WarnAndIgnore);
    let err = Retriever::from_config(&config, KeywordEmbedder::new()).unwrap_err();
    assert!(matches!(err, Error::MissingArtifact { .. }));

    let config = fixture.config(BackendKind::Flat, FilterPolicy::WarnAndIgnore);
    let retriever = Retriever::from_config(&config, KeywordEmbedder::new()).unwrap();
    assert_eq!(retriever.backend().len().unwrap(), 1);
}

#[tokio::test]
async fn test_backend_count_must_match_manifest() {
    let fixture = Fixture::build().await;
    let layout = IndexLayout::new(&fixture.config.paths.embeddings_dir);
    let mut manifest = IndexManifest::load(&layout.manifest()).unwrap();
    manifest.total_chunks += 1;
    manifest.save(&layout.manifest()).unwrap();

    let config = fixture.config(BackendKind::Collection, FilterPolicy::WarnAndIgnore);
    let err = Retriever::from_config(&config, KeywordEmbedder::new()).unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}

#[tokio::test]
async fn test_generator_availability_uses_provider_health() {
    assert!(AnswerGenerator::new(ScriptedLlm::answering(VAT_ANSWER)).is_available().await);
    assert!(!AnswerGenerator::new(ScriptedLlm::failing("down")).is_available().await);
}
