//! Integration coverage for the Knowledge Graph Manager (spec §4.6, §8
//! scenarios S5-S7, properties 7-11) against the in-memory fakes.

mod support;

use std::collections::HashSet;
use std::sync::Arc;

use memoria_core::{
    BulkResult, CreatedBy, Direction, GraphManager, KeywordSets, Memory, MemoryKind,
    MemoriaError, RelationInput, RelationType, VectorStoreAdapter,
};
use support::{HashEmbedder, InMemoryRelationalStore, InMemoryVectorStore};

const EMBED_DIMS: usize = 32;

async fn seed_memory(vector_store: &InMemoryVectorStore, embedder: &HashEmbedder, kind: MemoryKind, content: &str) -> Memory {
    let memory = Memory::new(kind, content);
    let embedding = embedder.embed(content, memoria_core::EmbeddingKind::Document).await.unwrap();
    let mut payload = memory.to_base_payload();
    payload.insert("is_chunk".into(), serde_json::json!(false));
    payload.insert("parent_id".into(), serde_json::json!(memory.id.to_string()));
    vector_store
        .upsert(kind.collection_name(), embedding.vector, payload, Some(memory.id))
        .await
        .unwrap();
    memory
}

fn graph_manager(vector_store: Arc<dyn VectorStoreAdapter>) -> (GraphManager, Arc<InMemoryRelationalStore>) {
    let relational = Arc::new(InMemoryRelationalStore::new());
    let as_trait: Arc<dyn memoria_core::RelationalStoreAdapter> = relational.clone();
    (GraphManager::new(Some(as_trait), vector_store, KeywordSets::default()), relational)
}

#[tokio::test]
async fn property8_self_loop_is_rejected() {
    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(InMemoryVectorStore::new());
    let (graph, _) = graph_manager(vector_store);
    let id = uuid::Uuid::new_v4();
    let err = graph
        .add_relation(id, id, RelationType::Related, 1.0, CreatedBy::User, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MemoriaError::InvalidInput(_)));
}

#[tokio::test]
async fn property7_relation_uniqueness_bulk_insert_twice() {
    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(InMemoryVectorStore::new());
    let (graph, _) = graph_manager(vector_store);
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();

    let items = vec![RelationInput {
        source_id: a,
        target_id: b,
        relation_type: RelationType::Related,
        weight: 1.0,
        metadata: Default::default(),
    }];
    let first: BulkResult = graph.add_relations_bulk(items, CreatedBy::User).await.unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(first.duplicates, 0);

    let items_again = vec![RelationInput {
        source_id: a,
        target_id: b,
        relation_type: RelationType::Related,
        weight: 1.0,
        metadata: Default::default(),
    }];
    let second = graph.add_relations_bulk(items_again, CreatedBy::User).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.duplicates, 1);
}

#[tokio::test]
async fn s5_fixes_relation_inferred_and_confidence_boosted_by_project() {
    let vs = InMemoryVectorStore::new();
    let embedder = HashEmbedder::new(EMBED_DIMS);

    let bug = seed_memory(&vs, &embedder, MemoryKind::Episodic, "we hit a nasty bug in the parser").await;
    let mut fix_memory = Memory::new(MemoryKind::Episodic, "here is the fix for the parser bug");
    if let memoria_core::KindFields::Episodic(f) = &mut fix_memory.kind_fields {
        f.project = Some("parser-project".to_string());
    }
    let fix_embedding = embedder.embed(&fix_memory.content, memoria_core::EmbeddingKind::Document).await.unwrap();
    let mut fix_payload = fix_memory.to_base_payload();
    fix_payload.insert("is_chunk".into(), serde_json::json!(false));
    fix_payload.insert("parent_id".into(), serde_json::json!(fix_memory.id.to_string()));
    vs.upsert(MemoryKind::Episodic.collection_name(), fix_embedding.vector, fix_payload, Some(fix_memory.id))
        .await
        .unwrap();

    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(vs);
    let (graph, _) = graph_manager(vector_store);

    let suggestions = graph.suggest_relations(bug.id, 5, 0.0).await.unwrap();
    let fix_suggestion = suggestions.iter().find(|s| s.target_id == fix_memory.id);
    assert!(fix_suggestion.is_some(), "expected the fix memory to surface as a suggestion: {suggestions:?}");
    assert_eq!(fix_suggestion.unwrap().relation_type, RelationType::Fixes);
}

#[tokio::test]
async fn s6_bulk_insert_counts_duplicates_within_one_call() {
    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(InMemoryVectorStore::new());
    let (graph, _) = graph_manager(vector_store);
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();

    let items = vec![
        RelationInput { source_id: a, target_id: b, relation_type: RelationType::Causes, weight: 1.0, metadata: Default::default() },
        RelationInput { source_id: a, target_id: b, relation_type: RelationType::Causes, weight: 1.0, metadata: Default::default() },
    ];
    let result = graph.add_relations_bulk(items, CreatedBy::User).await.unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.duplicates, 1);
}

#[tokio::test]
async fn s7_find_path_and_get_neighbors_follow_a_causes_chain() {
    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(InMemoryVectorStore::new());
    let (graph, _) = graph_manager(vector_store);

    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    let c = uuid::Uuid::new_v4();
    graph.add_relation(a, b, RelationType::Causes, 1.0, CreatedBy::User, Default::default()).await.unwrap();
    graph.add_relation(b, c, RelationType::Causes, 1.0, CreatedBy::User, Default::default()).await.unwrap();

    let path = graph.find_path(a, c, 5).await.unwrap();
    assert!(path.found);
    assert_eq!(path.steps.len(), 2);
    assert_eq!(path.steps.last().unwrap().memory_id, c);

    let neighbors = graph.get_neighbors(a, 2, None).await.unwrap();
    assert!(neighbors.iter().any(|n| n.memory_id == b && n.depth == 1));
    assert!(neighbors.iter().any(|n| n.memory_id == c && n.depth == 2));
}

#[tokio::test]
async fn property9_neighbor_paths_never_repeat_an_id() {
    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(InMemoryVectorStore::new());
    let (graph, _) = graph_manager(vector_store);

    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    graph.add_relation(a, b, RelationType::Related, 1.0, CreatedBy::User, Default::default()).await.unwrap();
    graph.add_relation(b, a, RelationType::Related, 1.0, CreatedBy::User, Default::default()).await.unwrap();

    let neighbors = graph.get_neighbors(a, 5, None).await.unwrap();
    for n in &neighbors {
        assert!(n.depth <= 5);
        let mut seen = HashSet::new();
        assert!(n.path.iter().all(|id| seen.insert(*id)), "path must not revisit a node: {:?}", n.path);
    }
}

#[tokio::test]
async fn property10_confidence_always_in_unit_interval() {
    let c = memoria_core::composite_confidence(1.0, RelationType::Fixes, 10, MemoryKind::Semantic, MemoryKind::Semantic, Some("p"), Some("p"));
    assert!((0.0..=1.0).contains(&c));
    let c_low = memoria_core::composite_confidence(0.0, RelationType::Related, 0, MemoryKind::Episodic, MemoryKind::Procedural, None, None);
    assert!((0.0..=1.0).contains(&c_low));
}

#[tokio::test]
async fn property11_rejected_suggestion_stays_rejected_across_discovery_runs() {
    let vs = InMemoryVectorStore::new();
    let embedder = HashEmbedder::new(EMBED_DIMS);
    let a = seed_memory(&vs, &embedder, MemoryKind::Semantic, "shared vocabulary content one two three").await;
    let b = seed_memory(&vs, &embedder, MemoryKind::Semantic, "shared vocabulary content one two three").await;

    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(vs);
    let (graph, _relational) = graph_manager(vector_store);

    let suggestions = graph.suggest_relations(a.id, 5, 0.0).await.unwrap();
    let candidate = suggestions.iter().find(|s| s.target_id == b.id).expect("b should be suggested");

    graph.reject_suggestion(a.id, b.id, candidate.relation_type).await.unwrap();
    assert!(graph.is_rejected(a.id, b.id, candidate.relation_type).await.unwrap());

    let rejected_pairs: HashSet<(uuid::Uuid, uuid::Uuid, RelationType)> =
        HashSet::from([(a.id, b.id, candidate.relation_type)]);
    let discovery = graph
        .discover_relations_global(10, 0.0, 2.0, false, Some(&[MemoryKind::Semantic]), &rejected_pairs)
        .await
        .unwrap();

    assert!(
        !discovery.suggestions.iter().any(|s| s.source_id == a.id && s.target_id == b.id),
        "a previously rejected pair must not resurface"
    );
}

#[tokio::test]
async fn remove_relation_removes_matching_rows() {
    let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(InMemoryVectorStore::new());
    let (graph, _) = graph_manager(vector_store);
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    graph.add_relation(a, b, RelationType::Related, 1.0, CreatedBy::User, Default::default()).await.unwrap();

    let removed = graph.remove_relation(a, b, None).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = graph.get_relations(a, Direction::Out, None, false).await.unwrap();
    assert!(remaining.is_empty());
}
