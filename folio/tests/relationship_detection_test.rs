mod common;

use pretty_assertions::assert_eq;
use wiremock::MockServer;

use folio::config::Config;
use folio::embeddings::EmbeddingGateway;
use folio::error::FolioError;
use folio::intelligence::{DetectionReport, DetectionTarget, RelationshipDetector};
use folio::models::{EntityType, MemoryEntity, RelationshipType};

use common::{at_similarity, embeddings_for, mount_embeddings, test_db, VectorTable};

#[tokio::test]
async fn memory_neighbours_are_classified_into_bands() {
    let db = test_db().await;
    let anchor = MemoryEntity::new("alice", EntityType::Concept, "Entropy", vec![1.0, 0.0, 0.0, 0.0]);
    db.db.create_entity(&anchor).await.unwrap();
    for (text, sim) in [
        ("Second law of thermodynamics", 0.95),
        ("Heat death of the universe", 0.87),
        ("Information theory", 0.78),
        ("Baroque architecture", 0.40),
    ] {
        let entity = MemoryEntity::new("alice", EntityType::Concept, text, at_similarity(sim));
        db.db.create_entity(&entity).await.unwrap();
    }

    let detector = RelationshipDetector::new(
        db.db.clone(),
        EmbeddingGateway::unavailable("not needed for stored memories"),
        &Config::default().detector,
    );

    let target = DetectionTarget::Memory(anchor.id.clone());
    let report = detector.detect("alice", &target).await.unwrap();
    assert_eq!(
        report,
        DetectionReport {
            scanned: 4,
            created: 3,
            strong: 1,
            moderate: 1,
            weak: 1,
        }
    );

    let mut labels: Vec<RelationshipType> = db
        .db
        .list_relationships_touching("alice", std::slice::from_ref(&anchor.id))
        .await
        .unwrap()
        .into_iter()
        .inspect(|rel| assert!(rel.auto_detected))
        .map(|rel| rel.relationship_type)
        .collect();
    labels.sort_by_key(|t| t.to_string());
    assert_eq!(
        labels,
        vec![
            RelationshipType::Explains,
            RelationshipType::RelatesTo,
            RelationshipType::Supports
        ]
    );

    let again = detector.detect("alice", &target).await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.scanned, 1);

    let anchor = db.db.get_entity("alice", &anchor.id).await.unwrap().unwrap();
    assert_eq!(anchor.degree, 3);
}

#[tokio::test]
async fn missing_target_is_not_found() {
    let db = test_db().await;
    let detector = RelationshipDetector::new(
        db.db.clone(),
        EmbeddingGateway::unavailable("offline"),
        &Config::default().detector,
    );

    let err = detector
        .detect("alice", &DetectionTarget::Note("nope".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, FolioError::NotFound(_)));
}

#[tokio::test]
async fn note_without_embedding_is_embedded_on_demand() {
    let server = MockServer::start().await;
    mount_embeddings(
        &server,
        VectorTable::new(&[("Entropy always increases", at_similarity(0.93))]),
    )
    .await;

    let db = test_db().await;
    let memory = MemoryEntity::new("alice", EntityType::Insight, "Entropy", vec![1.0, 0.0, 0.0, 0.0]);
    db.db.create_entity(&memory).await.unwrap();
    let note = folio::models::Note::new("alice", None, "Entropy always increases");
    db.db.create_note(&note).await.unwrap();

    let detector = RelationshipDetector::new(
        db.db.clone(),
        embeddings_for(&server),
        &Config::default().detector,
    );
    let report = detector
        .detect("alice", &DetectionTarget::Note(note.id.clone()))
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.strong, 1);
    let stored = db.db.get_note("alice", &note.id).await.unwrap().unwrap();
    assert!(stored.embedding.is_some());
    let rels = db.db.list_note_relationships("alice", &note.id).await.unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].related_id, memory.id);
}

#[tokio::test]
async fn unreachable_provider_yields_empty_report() {
    let db = test_db().await;
    let note = folio::models::Note::new("alice", None, "Unembedded thought");
    db.db.create_note(&note).await.unwrap();

    let detector = RelationshipDetector::new(
        db.db.clone(),
        EmbeddingGateway::unavailable("offline"),
        &Config::default().detector,
    );
    let report = detector
        .detect("alice", &DetectionTarget::Note(note.id))
        .await
        .unwrap();
    assert_eq!(report, DetectionReport::default());
}

#[tokio::test]
async fn label_agrees_with_stored_strength() {
    let db = test_db().await;
    let anchor = MemoryEntity::new("alice", EntityType::Concept, "Refraction", vec![1.0, 0.0, 0.0, 0.0]);
    db.db.create_entity(&anchor).await.unwrap();
    let neighbour = MemoryEntity::new("alice", EntityType::Concept, "Snell's law", at_similarity(0.89996));
    db.db.create_entity(&neighbour).await.unwrap();

    let detector = RelationshipDetector::new(
        db.db.clone(),
        EmbeddingGateway::unavailable("not needed for stored memories"),
        &Config::default().detector,
    );
    let report = detector
        .detect("alice", &DetectionTarget::Memory(anchor.id.clone()))
        .await
        .unwrap();
    assert_eq!(report.strong, 1);

    let rels = db
        .db
        .list_relationships_touching("alice", std::slice::from_ref(&anchor.id))
        .await
        .unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].strength, 0.9);
    assert_eq!(rels[0].relationship_type, RelationshipType::Supports);
}
