mod common;

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use wiremock::MockServer;

use folio::config::Config;
use folio::graph::UnifiedGraphEngine;
use folio::intelligence::{DetectionTarget, RelationshipDetector};
use folio::models::{
    CreateDocumentRequest, CreateNoteRequest, EntityType, MemoryEntity, NodeKind,
};
use folio::services::LibraryService;

use common::{at_similarity, embeddings_for, mount_embeddings, test_db, VectorTable};

const QUERY: &str = "light through lenses";

struct Library {
    optics: String,
    thermo: String,
    geometric: String,
    note: String,
    memory: String,
}

async fn seed(server: &MockServer, db: &common::TestDb) -> Library {
    mount_embeddings(
        server,
        VectorTable::new(&[
            ("Optics", vec![1.0, 0.0, 0.0, 0.0]),
            ("Thermodynamics", vec![0.0, 0.0, 1.0, 0.0]),
            ("Geometric optics", at_similarity(0.92)),
            ("Lenses bend light", at_similarity(0.87)),
            (QUERY, at_similarity(0.9)),
        ]),
    )
    .await;

    let library = LibraryService::new(db.db.clone(), embeddings_for(server));
    let mut ids = Vec::new();
    for title in ["Optics", "Thermodynamics", "Geometric optics"] {
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
        assert!(doc.embedding.is_some());
        ids.push(doc.id);
    }

    let note = library
        .add_note(
            "alice",
            CreateNoteRequest {
                document_id: Some(ids[1].clone()),
                content: "Lenses bend light".to_string(),
                highlight: None,
            },
        )
        .await
        .unwrap();

    let memory = MemoryEntity::new("alice", EntityType::Concept, "Focal length", vec![0.0, 1.0, 0.0, 0.0])
        .with_document(Some(&ids[0]));
    db.db.create_entity(&memory).await.unwrap();

    Library {
        optics: ids[0].clone(),
        thermo: ids[1].clone(),
        geometric: ids[2].clone(),
        note: note.id,
        memory: memory.id,
    }
}

fn engine(server: &MockServer, db: &common::TestDb) -> UnifiedGraphEngine {
    let config = Config::default();
    UnifiedGraphEngine::new(db.db.clone(), embeddings_for(server), config.graph, config.search)
}

#[tokio::test]
async fn document_detection_links_documents_and_notes() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let lib = seed(&server, &db).await;

    let detector = RelationshipDetector::new(
        db.db.clone(),
        embeddings_for(&server),
        &Config::default().detector,
    );
    let report = detector
        .detect("alice", &DetectionTarget::Document(lib.optics.clone()))
        .await
        .unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.created, 2);
    assert_eq!(report.strong, 1);
    assert_eq!(report.moderate, 1);

    let links = db.db.list_document_links("alice", &lib.optics).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].to_document_id, lib.geometric);
}

#[tokio::test]
async fn document_centric_graph_spans_all_node_kinds() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let lib = seed(&server, &db).await;
    RelationshipDetector::new(db.db.clone(), embeddings_for(&server), &Config::default().detector)
        .detect("alice", &DetectionTarget::Document(lib.optics.clone()))
        .await
        .unwrap();
    let engine = engine(&server, &db);

    let graph = engine
        .get_document_centric_graph("alice", &lib.optics, 2)
        .await
        .unwrap();
    assert_eq!(graph.root_id.as_deref(), Some(lib.optics.as_str()));
    let ids: BTreeSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let expected: BTreeSet<&str> = [
        lib.optics.as_str(),
        lib.geometric.as_str(),
        lib.note.as_str(),
        lib.memory.as_str(),
    ]
    .into_iter()
    .collect();
    assert_eq!(ids, expected);
    assert!(!ids.contains(lib.thermo.as_str()));
    assert_eq!(graph.node(&lib.memory).map(|n| n.kind), Some(NodeKind::Memory));
    assert_eq!(graph.node(&lib.note).map(|n| n.depth), Some(1));
    assert!(graph
        .edges
        .iter()
        .any(|e| e.from_id == lib.optics && e.to_id == lib.memory && e.label == "mentions"));

    let shallow = engine
        .get_document_centric_graph("alice", &lib.optics, 0)
        .await
        .unwrap();
    assert_eq!(shallow.nodes.len(), 1);
    assert!(shallow.edges.is_empty());

    let foreign = engine
        .get_document_centric_graph("bob", &lib.optics, 2)
        .await
        .unwrap();
    assert!(foreign.is_empty());
}

#[tokio::test]
async fn search_ranks_every_kind_together() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let lib = seed(&server, &db).await;
    let engine = engine(&server, &db);

    let hits = engine.search_across_graphs("alice", QUERY, 3).await.unwrap();
    let ranked: Vec<(&str, NodeKind)> = hits.iter().map(|h| (h.id.as_str(), h.kind)).collect();
    assert_eq!(
        ranked,
        vec![
            (lib.geometric.as_str(), NodeKind::Document),
            (lib.note.as_str(), NodeKind::Note),
            (lib.optics.as_str(), NodeKind::Document),
        ]
    );
    assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));

    assert!(engine.search_across_graphs("bob", QUERY, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn timeline_is_chronological() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let lib = seed(&server, &db).await;
    let engine = engine(&server, &db);

    let timeline = engine.get_timeline("alice", QUERY).await.unwrap();
    let ids: Vec<&str> = timeline.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![lib.optics.as_str(), lib.geometric.as_str(), lib.note.as_str()]
    );
    assert!(timeline
        .windows(2)
        .all(|w| w[0].created_at <= w[1].created_at));
}
