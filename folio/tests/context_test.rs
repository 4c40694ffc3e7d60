mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use wiremock::MockServer;

use folio::config::Config;
use folio::graph::UnifiedGraphEngine;
use folio::models::{
    ContextBundle, ContextLimits, CreateDocumentRequest, CreateNoteRequest, EntityType,
    MemoryEntity, MemoryRelationship, RelationshipType,
};
use folio::services::{ContextBuilder, LibraryService};

use common::{at_similarity, embeddings_for, mount_embeddings, test_db, VectorTable};

const QUERY: &str = "how do lenses focus light";

struct Seeded {
    optics: String,
    note: String,
    focal: String,
    aperture: String,
    chromatic: String,
    glass: String,
}

async fn seed(server: &MockServer, db: &common::TestDb) -> Seeded {
    mount_embeddings(
        server,
        VectorTable::new(&[
            (QUERY, vec![1.0, 0.0, 0.0, 0.0]),
            ("Optics", vec![1.0, 0.0, 0.0, 0.0]),
            ("Lens design", at_similarity(0.6)),
            ("Thermodynamics", vec![0.0, 0.0, 1.0, 0.0]),
            ("Lenses bend light", at_similarity(0.7)),
        ]),
    )
    .await;

    let library = LibraryService::new(db.db.clone(), embeddings_for(server));
    let mut docs = Vec::new();
    for title in ["Optics", "Lens design", "Thermodynamics"] {
        let doc = library
            .add_document(
                "alice",
                CreateDocumentRequest {
                    title: title.to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
        docs.push(doc.id);
    }
    let note = library
        .add_note(
            "alice",
            CreateNoteRequest {
                document_id: Some(docs[0].clone()),
                content: "Lenses bend light".to_string(),
                highlight: None,
            },
        )
        .await
        .unwrap();

    let mut ids = Vec::new();
    for (text, vector) in [
        ("Focal length", at_similarity(0.95)),
        ("Aperture", at_similarity(0.9)),
        ("Chromatic aberration", at_similarity(0.8)),
        ("Glass manufacturing", vec![0.0, 0.0, 0.0, 1.0]),
    ] {
        let entity = MemoryEntity::new("alice", EntityType::Concept, text, vector);
        db.db.create_entity(&entity).await.unwrap();
        ids.push(entity.id);
    }
    for to in [&ids[2], &ids[3]] {
        let rel = MemoryRelationship::new("alice", &ids[0], to, RelationshipType::RelatesTo, 0.8);
        db.db.create_relationship(&rel).await.unwrap();
    }

    Seeded {
        optics: docs[0].clone(),
        note: note.id,
        focal: ids[0].clone(),
        aperture: ids[1].clone(),
        chromatic: ids[2].clone(),
        glass: ids[3].clone(),
    }
}

fn builder(server: &MockServer, db: &common::TestDb) -> ContextBuilder {
    let config = Config::default();
    let threshold = config.search.default_threshold;
    let unified = Arc::new(UnifiedGraphEngine::new(
        db.db.clone(),
        embeddings_for(server),
        config.graph,
        config.search,
    ));
    ContextBuilder::new(unified, embeddings_for(server), threshold)
}

fn limits(max_chars: usize) -> ContextLimits {
    ContextLimits {
        max_memories: 2,
        max_notes: 5,
        max_documents: 1,
        max_chars,
        include_related: true,
    }
}

fn ids(items: &[folio::models::ContextItem]) -> Vec<&str> {
    items.iter().map(|i| i.id.as_str()).collect()
}

fn chars(bundle: &ContextBundle) -> usize {
    [&bundle.documents, &bundle.notes, &bundle.memories, &bundle.related]
        .into_iter()
        .flatten()
        .map(|i| i.text.chars().count())
        .sum()
}

#[tokio::test]
async fn per_kind_caps_and_related_expansion() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let seeded = seed(&server, &db).await;

    let bundle = builder(&server, &db)
        .build("alice", QUERY, limits(10_000))
        .await
        .unwrap();

    assert!(!bundle.degraded);
    assert!(!bundle.truncated);
    assert_eq!(ids(&bundle.documents), vec![seeded.optics.as_str()]);
    assert_eq!(ids(&bundle.notes), vec![seeded.note.as_str()]);
    assert_eq!(
        ids(&bundle.memories),
        vec![seeded.focal.as_str(), seeded.aperture.as_str()]
    );
    assert_eq!(
        ids(&bundle.related),
        vec![seeded.chromatic.as_str(), seeded.glass.as_str()]
    );
    assert!(bundle.related[0].score > bundle.related[1].score);
    assert_eq!(bundle.total_chars, chars(&bundle));
}

#[tokio::test]
async fn related_items_are_dropped_before_direct_hits() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let seeded = seed(&server, &db).await;

    // "Optics" + "Focal length" + "Aperture" + "Lenses bend light"
    let direct_chars = 6 + 12 + 8 + 17;
    let bundle = builder(&server, &db)
        .build("alice", QUERY, limits(direct_chars))
        .await
        .unwrap();

    assert!(bundle.truncated);
    assert_eq!(bundle.total_chars, direct_chars);
    assert_eq!(ids(&bundle.notes), vec![seeded.note.as_str()]);
    assert_eq!(bundle.memories.len(), 2);
    assert!(bundle.related.is_empty());
    // The related memory outscored the note yet was still cut.
    assert!(bundle.notes[0].score < 0.8);
}

#[tokio::test]
async fn tight_budget_keeps_best_direct_hits() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let seeded = seed(&server, &db).await;

    let bundle = builder(&server, &db)
        .build("alice", QUERY, limits(30))
        .await
        .unwrap();

    assert!(bundle.truncated);
    assert_eq!(ids(&bundle.documents), vec![seeded.optics.as_str()]);
    assert_eq!(
        ids(&bundle.memories),
        vec![seeded.focal.as_str(), seeded.aperture.as_str()]
    );
    assert!(bundle.notes.is_empty());
    assert!(bundle.related.is_empty());
    assert_eq!(bundle.total_chars, 26);
}

#[tokio::test]
async fn other_owners_get_nothing() {
    let server = MockServer::start().await;
    let db = test_db().await;
    seed(&server, &db).await;

    let bundle = builder(&server, &db)
        .build("bob", QUERY, limits(10_000))
        .await
        .unwrap();
    assert!(bundle.is_empty());
    assert!(!bundle.degraded);
}
