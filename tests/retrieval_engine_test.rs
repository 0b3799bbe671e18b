//! Integration tests for the retrieval engine over a freshly built index.
//!
//! The fixture is a small three-page guideline with one section per
//! urgency tier, so ranking and tier ordering are observable end to end.

use ng12_retrieval::config::{EmbeddingConfig, EmbeddingProviderKind};
use ng12_retrieval::embedding::provider_from_config;
use ng12_retrieval::ingest::ingest_pages;
use ng12_retrieval::outline::UrgencyLevel;
use ng12_retrieval::{Gender, PageText, QueryError, RetrievalEngine, SearchHit, Settings};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn guideline_pages() -> Vec<PageText> {
    let page_one = "Suspected cancer: recognition and referral\n\
                    This guideline covers identifying adults with symptoms that could be \
                    caused by cancer.\n\
                    \n\
                    1.1 Lung and pleural cancers\n\
                    1.1.1 Refer people using a suspected cancer pathway referral for lung cancer\n\
                    if they have chest X-ray findings that suggest lung cancer or are aged 40\n\
                    and over with unexplained haemoptysis.\n\
                    People who smoke and present coughing up blood need assessment for\n\
                    unexplained haemoptysis without delay.";

    let page_two = "1.2 Mesothelioma\n\
                    1.2.1 Offer an urgent chest X-ray to assess for mesothelioma in people aged\n\
                    40 and over with finger clubbing or persistent chest pain.\n\
                    1.2.2 Consider a chest X-ray for people with persistent cough and \
                    occupational asbestos exposure.";

    let page_three = "1.3 Upper gastrointestinal tract cancers\n\
                      1.3.1 Oesophageal cancer\n\
                      1.3.1.1 Arrange a very urgent referral for an endoscopy within 2 weeks in\n\
                      people aged 55 and over with dysphagia or with weight loss and reflux.\n\
                      1.3.2 Stomach cancer\n\
                      1.3.2.1 Advise people at low risk about symptom monitoring and safety netting.";

    vec![
        PageText::new(1, page_one),
        PageText::new(2, page_two),
        PageText::new(3, page_three),
    ]
}

fn hashed_settings(temp_dir: &TempDir) -> Settings {
    Settings {
        index_path: temp_dir.path().join("index"),
        embedding: EmbeddingConfig {
            provider: EmbeddingProviderKind::Hashed,
            ..EmbeddingConfig::default()
        },
        ..Settings::default()
    }
}

/// Build the fixture index and an engine over it. The TempDir keeps the
/// artifact alive for the duration of the test.
fn engine_fixture() -> (TempDir, RetrievalEngine) {
    let temp_dir = TempDir::new().unwrap();
    let settings = hashed_settings(&temp_dir);
    let provider = provider_from_config(&settings.embedding).unwrap();
    let (index, _report) =
        ingest_pages(&guideline_pages(), &settings, provider.as_ref(), |_| {}).unwrap();
    let engine = RetrievalEngine::new(Arc::new(index), provider).unwrap();
    (temp_dir, engine)
}

fn hit_ids(hits: &[SearchHit]) -> Vec<String> {
    hits.iter().map(|hit| hit.chunk.id.clone()).collect()
}

#[test]
fn test_query_ranks_matching_section_first() {
    let (_temp, engine) = engine_fixture();

    let hits = engine
        .query_text("unexplained haemoptysis coughing up blood", 3)
        .unwrap();
    assert!(!hits.is_empty(), "Should find the lung cancer section");
    assert_eq!(
        hits[0].chunk.section.as_deref(),
        Some("1.1"),
        "Lung section should rank first for a haemoptysis query"
    );

    for hit in &hits {
        assert!(
            (0.0..=1.0).contains(&hit.score),
            "Score {} should be within [0, 1]",
            hit.score
        );
    }
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score, "Hits should be ordered by score");
    }
}

#[test]
fn test_k_is_clamped_and_capped() {
    let (_temp, engine) = engine_fixture();

    let one = engine.query_text("dysphagia", 0).unwrap();
    assert_eq!(one.len(), 1, "k = 0 should be clamped to a single result");

    let all = engine.query_text("dysphagia", 50).unwrap();
    assert_eq!(
        all.len(),
        engine.index().len(),
        "Oversized k should return every chunk once"
    );
}

#[test]
fn test_blank_query_rejected() {
    let (_temp, engine) = engine_fixture();

    assert!(matches!(engine.query_text("", 5), Err(QueryError::EmptyQuery)));
    assert!(matches!(engine.query_text("  \n\t ", 5), Err(QueryError::EmptyQuery)));
}

#[test]
fn test_symptom_queries_are_order_independent() {
    let (_temp, engine) = engine_fixture();

    let forward: BTreeSet<String> = ["dysphagia", "weight loss", "reflux"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let reversed: BTreeSet<String> = ["reflux", "weight loss", "dysphagia"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let first = engine
        .query_by_symptoms(&forward, 60, Gender::Female, 4)
        .unwrap();
    let second = engine
        .query_by_symptoms(&reversed, 60, Gender::Female, 4)
        .unwrap();

    assert_eq!(
        hit_ids(&first),
        hit_ids(&second),
        "Symptom order should not change retrieval"
    );
    assert!(!first.is_empty(), "Symptom search should return results");
}

#[test]
fn test_symptom_query_validation() {
    let (_temp, engine) = engine_fixture();

    let none: BTreeSet<String> = BTreeSet::new();
    assert!(matches!(
        engine.query_by_symptoms(&none, 50, Gender::Other, 5),
        Err(QueryError::EmptyQuery)
    ));

    let some: BTreeSet<String> = ["cough".to_string()].into_iter().collect();
    assert!(matches!(
        engine.query_by_symptoms(&some, 200, Gender::Male, 5),
        Err(QueryError::InvalidAge(200))
    ));
}

#[test]
fn test_section_context_is_ordered_and_total() {
    let (_temp, engine) = engine_fixture();

    let chunks = engine.section_context("1.1").unwrap();
    assert!(!chunks.is_empty(), "Section 1.1 should have content");
    for chunk in &chunks {
        assert_eq!(chunk.section.as_deref(), Some("1.1"));
    }
    for pair in chunks.windows(2) {
        assert!(pair[0].seq < pair[1].seq, "Section context should follow document order");
    }

    let missing = engine.section_context("9.9").unwrap();
    assert!(missing.is_empty(), "Unknown section should be empty, not an error");
}

#[test]
fn test_urgent_recommendations_follow_tier_order() {
    let (_temp, engine) = engine_fixture();

    let urgent = engine.urgent_recommendations(10).unwrap();
    let tiers: Vec<UrgencyLevel> = urgent.iter().map(|chunk| chunk.urgency).collect();
    assert_eq!(
        tiers,
        vec![
            UrgencyLevel::VeryUrgent,
            UrgencyLevel::SuspectedCancer,
            UrgencyLevel::Urgent,
        ],
        "Tier order should be very urgent, suspected cancer pathway, urgent"
    );

    let sections: Vec<&str> = urgent
        .iter()
        .filter_map(|chunk| chunk.section.as_deref())
        .collect();
    assert_eq!(
        sections,
        vec!["1.3", "1.1", "1.2"],
        "Tier precedence should override document order"
    );

    let top = engine.urgent_recommendations(1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].urgency, UrgencyLevel::VeryUrgent);
}

#[test]
fn test_statistics_reflect_the_document() {
    let (_temp, engine) = engine_fixture();

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.document_label, "ng12");
    assert_eq!(stats.total_chunks, engine.index().len());
    assert_eq!(stats.sections, vec!["1.1", "1.2", "1.3"]);
    // Chunk metadata carries the identifiers open at close time; all of
    // page three fits one chunk, so only its final subsection is stamped.
    assert_eq!(stats.subsections, vec!["1.3.2"]);
    assert!(stats.has_urgency, "Fixture carries urgent recommendations");
    assert_eq!(stats.urgency_counts.get("very_urgent"), Some(&1));
    assert_eq!(stats.urgency_counts.get("suspected_cancer"), Some(&1));
    assert_eq!(stats.urgency_counts.get("urgent"), Some(&1));
}

#[test]
fn test_generous_timeout_does_not_interfere() {
    let temp_dir = TempDir::new().unwrap();
    let settings = hashed_settings(&temp_dir);
    let provider = provider_from_config(&settings.embedding).unwrap();
    let (index, _) =
        ingest_pages(&guideline_pages(), &settings, provider.as_ref(), |_| {}).unwrap();

    let engine = RetrievalEngine::new(Arc::new(index), provider)
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    let hits = engine.query_text("persistent cough chest pain", 3).unwrap();
    assert!(!hits.is_empty(), "A generous deadline should leave queries unaffected");
}

#[test]
fn test_concurrent_queries_agree() {
    let (_temp, engine) = engine_fixture();
    let baseline = engine
        .query_text("dysphagia endoscopy referral", 3)
        .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| engine.query_text("dysphagia endoscopy referral", 3).unwrap())
            })
            .collect();
        for handle in handles {
            let hits = handle.join().unwrap();
            assert_eq!(
                hit_ids(&hits),
                hit_ids(&baseline),
                "Concurrent readers should see identical results"
            );
        }
    });
}
