//! Weft Core Integration Tests
//!
//! Exercises the ingestion pipeline and expansion resolver end to end
//! against an in-memory SQLite database, with a scripted extractor standing
//! in for the NLP service.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use weft_core::domain::auth::AuthenticatedUser;
use weft_core::domain::capture::{BasicHtmlToText, CaptureService, CreateCaptureInput};
use weft_core::domain::expansion::{ExpansionService, Graph, ListUseCase};
use weft_core::domain::extraction::{EntityExtractor, ExtractedEntity, ExtractionGateway};
use weft_core::domain::graph::edge::EdgeKind;
use weft_core::domain::graph::node::{EntityCategory, GraphNode, NodeLabel, Tag};
use weft_core::domain::graph::repository::GraphRepository;
use weft_core::domain::session::SessionService;
use weft_core::error::{Error, Result};
use weft_core::infrastructure::graph::SqliteGraphRepository;
use weft_core::storage::Database;

/// Scripted extractor: returns a fixed entity list and records every input
/// it was asked to analyze.
struct ScriptedExtractor {
    entities: Vec<ExtractedEntity>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    fn empty() -> Self {
        Self::with(Vec::new())
    }

    fn with(entities: Vec<ExtractedEntity>) -> Self {
        Self {
            entities,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EntityExtractor for ScriptedExtractor {
    async fn extract(&self, plain_text: &str) -> Result<Vec<ExtractedEntity>> {
        self.seen.lock().unwrap().push(plain_text.to_string());
        Ok(self.entities.clone())
    }
}

struct TestHarness {
    _db: Database,
    repository: Arc<SqliteGraphRepository>,
    captures: CaptureService<SqliteGraphRepository>,
    expansion: ExpansionService<SqliteGraphRepository>,
    sessions: SessionService<SqliteGraphRepository>,
    extractor: Arc<ScriptedExtractor>,
}

/// Opt into log output with `RUST_LOG=weft_core=debug cargo test`
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

async fn harness_with(extractor: ScriptedExtractor) -> TestHarness {
    init_tracing();
    let db = Database::in_memory().await.expect("in-memory database");
    let repository = Arc::new(SqliteGraphRepository::new(db.pool().clone()));
    let extractor = Arc::new(extractor);
    let gateway = ExtractionGateway::new(extractor.clone() as Arc<dyn EntityExtractor>);

    TestHarness {
        captures: CaptureService::new(
            Arc::clone(&repository),
            gateway,
            Arc::new(BasicHtmlToText),
        ),
        expansion: ExpansionService::new(Arc::clone(&repository)),
        sessions: SessionService::new(Arc::clone(&repository)),
        repository,
        extractor,
        _db: db,
    }
}

async fn harness() -> TestHarness {
    harness_with(ScriptedExtractor::empty()).await
}

fn alice() -> AuthenticatedUser {
    AuthenticatedUser::new("urn:weft:user:alice", "alice@example.com", "Alice")
}

fn bob() -> AuthenticatedUser {
    AuthenticatedUser::new("urn:weft:user:bob", "bob@example.com", "Bob")
}

fn body_input(body: &str) -> CreateCaptureInput {
    CreateCaptureInput {
        body: body.to_string(),
        ..Default::default()
    }
}

fn node_ids_with_label(graph: &Graph, label: NodeLabel) -> Vec<&str> {
    graph
        .nodes
        .iter()
        .filter(|n| n.label == label)
        .map(|n| n.id.as_str())
        .collect()
}

fn capture_id(graph: &Graph) -> String {
    graph
        .nodes
        .iter()
        .find(|n| n.label == NodeLabel::Capture && n.level == 0)
        .expect("created capture should be the level-0 root")
        .id
        .clone()
}

#[tokio::test]
async fn test_capture_with_tag_produces_two_node_graph() {
    let h = harness().await;
    let user = alice();

    let graph = h
        .captures
        .create_capture(&user, body_input("Hello #x"))
        .await
        .expect("create should succeed");

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].label, NodeLabel::Capture);
    assert_eq!(graph.nodes[0].level, 0);

    let tags = node_ids_with_label(&graph, NodeLabel::Tag);
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0], Tag::id_for(&user.id, "x"));

    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].kind, EdgeKind::TaggedWith);
    assert_eq!(graph.edges[0].source, graph.nodes[0].id);
    assert_eq!(graph.edges[0].destination, tags[0]);
}

#[tokio::test]
async fn test_same_tag_across_captures_collapses_to_one_node() {
    let h = harness().await;
    let user = alice();

    let first = h
        .captures
        .create_capture(&user, body_input("first #pitch"))
        .await
        .unwrap();
    let second = h
        .captures
        .create_capture(&user, body_input("second #Pitch"))
        .await
        .unwrap();

    let tag_id = Tag::id_for(&user.id, "pitch");
    assert_eq!(node_ids_with_label(&first, NodeLabel::Tag), vec![tag_id.as_str()]);
    assert_eq!(node_ids_with_label(&second, NodeLabel::Tag), vec![tag_id.as_str()]);

    // Expanding from the tag reaches both captures, with the tag as focus
    let from_tag = h.expansion.get_by_id(&user, &tag_id).await.unwrap();
    assert_eq!(node_ids_with_label(&from_tag, NodeLabel::Capture).len(), 2);
    let tag_node = from_tag.nodes.iter().find(|n| n.id == tag_id).unwrap();
    assert_eq!(tag_node.level, 0);
}

#[tokio::test]
async fn test_second_capture_reached_at_second_degree() {
    let h = harness().await;
    let user = alice();

    h.captures
        .create_capture(&user, body_input("one #shared"))
        .await
        .unwrap();
    let graph = h
        .captures
        .create_capture(&user, body_input("two #shared"))
        .await
        .unwrap();

    // root capture, shared tag, sibling capture
    assert_eq!(graph.nodes.len(), 3);
    let captures = node_ids_with_label(&graph, NodeLabel::Capture);
    assert_eq!(captures.len(), 2);
    let sibling = graph
        .nodes
        .iter()
        .find(|n| n.label == NodeLabel::Capture && n.level == 1)
        .expect("sibling should appear at level 1");
    assert_eq!(sibling.text, "one #shared");
    // Both tagged_with edges are inside the node set
    assert_eq!(graph.edges.len(), 2);
}

#[tokio::test]
async fn test_ownership_isolation() {
    let h = harness().await;
    let owner = alice();
    let other = bob();

    let graph = h
        .captures
        .create_capture(&owner, body_input("private #secret"))
        .await
        .unwrap();
    let id = capture_id(&graph);

    match h.expansion.get_by_id(&other, &id).await {
        Err(Error::NotFound(_)) => {}
        other_result => panic!("expected NotFound, got {:?}", other_result.map(|g| g.nodes)),
    }

    let listing = h
        .expansion
        .get_all(&other, ListUseCase::All, None)
        .await
        .unwrap();
    assert!(listing.graph.nodes.is_empty());

    // Shared tag text yields distinct per-owner nodes
    let other_graph = h
        .captures
        .create_capture(&other, body_input("mine #secret"))
        .await
        .unwrap();
    assert_eq!(other_graph.nodes.len(), 2, "no cross-owner tag or capture leaks in");
}

#[tokio::test]
async fn test_edit_regenerates_derived_edges() {
    let h = harness().await;
    let user = alice();

    let graph = h
        .captures
        .create_capture(&user, body_input("note #a"))
        .await
        .unwrap();
    let id = capture_id(&graph);

    let edited = h.captures.edit_capture(&user, &id, "note #b").await.unwrap();

    let tags = node_ids_with_label(&edited, NodeLabel::Tag);
    assert_eq!(tags, vec![Tag::id_for(&user.id, "b")]);
    assert!(
        !edited.nodes.iter().any(|n| n.id == Tag::id_for(&user.id, "a")),
        "stale tag relationship should be gone after edit"
    );
    let root = edited.nodes.iter().find(|n| n.id == id).unwrap();
    assert_eq!(root.text, "note #b");
}

#[tokio::test]
async fn test_edit_preserves_previous_edge() {
    let h = harness().await;
    let user = alice();

    let first = h.captures.create_capture(&user, body_input("first")).await.unwrap();
    let first_id = capture_id(&first);

    let second = h
        .captures
        .create_capture(
            &user,
            CreateCaptureInput {
                body: "second".into(),
                previous_id: Some(first_id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second_id = capture_id(&second);

    let edited = h
        .captures
        .edit_capture(&user, &second_id, "second, edited #tagged")
        .await
        .unwrap();

    assert!(
        edited
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Previous && e.destination == first_id),
        "previous edge is user intent and must survive edits"
    );
}

#[tokio::test]
async fn test_previous_chain_and_delete() {
    let h = harness().await;
    let user = alice();

    let first = h.captures.create_capture(&user, body_input("first")).await.unwrap();
    let first_id = capture_id(&first);

    let second = h
        .captures
        .create_capture(
            &user,
            CreateCaptureInput {
                body: "second".into(),
                previous_id: Some(first_id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second_id = capture_id(&second);

    assert!(second
        .edges
        .iter()
        .any(|e| e.kind == EdgeKind::Previous && e.source == second_id));

    // Deleting the predecessor removes the node and its edges
    assert!(h.captures.delete_capture(&user, &first_id).await.unwrap());
    assert!(!h.captures.delete_capture(&user, &first_id).await.unwrap());

    let after = h.expansion.get_by_id(&user, &second_id).await.unwrap();
    assert!(!after.nodes.iter().any(|n| n.id == first_id));
    assert!(!after.edges.iter().any(|e| e.kind == EdgeKind::Previous));
}

#[tokio::test]
async fn test_archived_capture_hidden_from_listing_but_retrievable() {
    let h = harness().await;
    let user = alice();

    let graph = h
        .captures
        .create_capture(&user, body_input("to archive #keep"))
        .await
        .unwrap();
    let id = capture_id(&graph);

    assert!(h.captures.archive_capture(&user, &id).await.unwrap());

    let listing = h.expansion.get_all(&user, ListUseCase::All, None).await.unwrap();
    assert!(listing.graph.nodes.is_empty());

    // Direct-id retrieval is the one path archive filtering skips
    let direct = h.expansion.get_by_id(&user, &id).await.unwrap();
    assert!(direct.nodes.iter().any(|n| n.id == id));
}

#[tokio::test]
async fn test_archived_capture_excluded_at_second_degree() {
    let h = harness().await;
    let user = alice();

    let archived = h
        .captures
        .create_capture(&user, body_input("old #shared"))
        .await
        .unwrap();
    h.captures
        .archive_capture(&user, &capture_id(&archived))
        .await
        .unwrap();

    let fresh = h
        .captures
        .create_capture(&user, body_input("new #shared"))
        .await
        .unwrap();
    let fresh_id = capture_id(&fresh);

    let expanded = h.expansion.get_by_id(&user, &fresh_id).await.unwrap();
    let captures = node_ids_with_label(&expanded, NodeLabel::Capture);
    assert_eq!(captures, vec![fresh_id.as_str()]);
}

#[tokio::test]
async fn test_entity_extraction_creates_weighted_references() {
    let entities = vec![
        ExtractedEntity {
            name: "Priya Sharma".into(),
            category: EntityCategory::Person,
            salience: 0.8,
            metadata: None,
        },
        ExtractedEntity {
            name: "Initech".into(),
            category: EntityCategory::Organization,
            salience: 0.2,
            metadata: None,
        },
    ];
    let h = harness_with(ScriptedExtractor::with(entities)).await;
    let user = alice();

    let graph = h
        .captures
        .create_capture(&user, body_input("Met Priya Sharma about Initech #pitch"))
        .await
        .unwrap();

    let entity_ids = node_ids_with_label(&graph, NodeLabel::Entity);
    assert_eq!(entity_ids.len(), 2);

    let reference_saliences: Vec<f32> = graph
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::References)
        .map(|e| e.salience.expect("references edges carry salience"))
        .collect();
    assert_eq!(reference_saliences.len(), 2);
    assert!(reference_saliences.contains(&0.8));

    // The extractor sees tag-stripped text
    let seen = h.extractor.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), ["Met Priya Sharma about Initech "]);
}

#[tokio::test]
async fn test_search_finds_capture_by_word() {
    let h = harness().await;
    let user = alice();

    h.captures
        .create_capture(&user, body_input("quarterly planning meeting"))
        .await
        .unwrap();
    h.captures
        .create_capture(&user, body_input("grocery list"))
        .await
        .unwrap();

    let results = h.expansion.search(&user, "planning", 0, 10).await.unwrap();
    let captures = node_ids_with_label(&results.graph, NodeLabel::Capture);
    assert_eq!(captures.len(), 1);
    assert_eq!(results.graph.nodes[0].text, "quarterly planning meeting");
    assert_eq!(results.page_info.start, 0);
}

#[tokio::test]
async fn test_empty_search_falls_back_to_random() {
    let h = harness().await;
    let user = alice();

    h.captures
        .create_capture(&user, body_input("the only note"))
        .await
        .unwrap();

    let results = h.expansion.search(&user, "   ", 0, 10).await.unwrap();
    assert_eq!(results.graph.nodes.len(), 1);
    assert_eq!(results.graph.nodes[0].text, "the only note");
}

#[tokio::test]
async fn test_search_with_no_captures_yields_empty_graph() {
    let h = harness().await;
    let results = h.expansion.search(&alice(), "", 0, 10).await.unwrap();
    assert!(results.graph.nodes.is_empty());
    assert_eq!(results.page_info.total, 0);
}

#[tokio::test]
async fn test_search_pagination_bounds_roots_before_expansion() {
    let h = harness().await;
    let user = alice();

    for body in [
        "harvest log one #field",
        "harvest log two #field",
        "harvest log three #field",
        "harvest log four #field",
    ] {
        h.captures.create_capture(&user, body_input(body)).await.unwrap();
    }

    let page = h.expansion.search(&user, "harvest", 0, 2).await.unwrap();
    let roots: Vec<_> = page
        .graph
        .nodes
        .iter()
        .filter(|n| n.label == NodeLabel::Capture && n.level == 0)
        .collect();
    assert_eq!(roots.len(), 2, "count bounds the root captures");
    // Expansion through the shared tag pulls the other matches back in at
    // level 1, so the assembled graph is larger than the page.
    assert_eq!(node_ids_with_label(&page.graph, NodeLabel::Capture).len(), 4);
    assert_eq!(page.page_info.total, 5);
    assert_eq!(page.page_info.count, 2);

    let second_page = h.expansion.search(&user, "harvest", 2, 2).await.unwrap();
    let second_roots = second_page
        .graph
        .nodes
        .iter()
        .filter(|n| n.label == NodeLabel::Capture && n.level == 0)
        .count();
    assert_eq!(second_roots, 2);
    assert_eq!(second_page.page_info.start, 2);

    // Starting past the match set leaves nothing to expand from
    let past_end = h.expansion.search(&user, "harvest", 4, 2).await.unwrap();
    assert!(past_end.graph.nodes.is_empty());
    assert_eq!(past_end.page_info.total, 0);
}

#[tokio::test]
async fn test_cross_owner_relationship_rejected() {
    let h = harness().await;
    let owner = alice();
    let other = bob();

    let a = h.captures.create_capture(&owner, body_input("theirs a")).await.unwrap();
    let b = h.captures.create_capture(&owner, body_input("theirs b")).await.unwrap();
    let a_id = capture_id(&a);
    let b_id = capture_id(&b);

    match h.captures.dismiss_capture_relation(&other, &a_id, &b_id).await {
        Err(Error::NotFound(_)) => {}
        result => panic!("expected NotFound for foreign endpoints, got {:?}", result),
    }

    // A previous-chain link at somebody else's capture is refused the same way
    match h
        .captures
        .create_capture(
            &other,
            CreateCaptureInput {
                body: "chained onto theirs".into(),
                previous_id: Some(a_id.clone()),
                ..Default::default()
            },
        )
        .await
    {
        Err(Error::NotFound(_)) => {}
        result => panic!(
            "expected NotFound, got {:?}",
            result.map(|g| g.nodes)
        ),
    }
}

#[tokio::test]
async fn test_focus_node_without_captures_still_rendered() {
    let h = harness().await;
    let user = alice();

    let session = h.sessions.create_session(&user, "Empty shelf").await.unwrap();

    let graph = h.expansion.get_by_id(&user, &session.id).await.unwrap();
    assert_eq!(graph.nodes.len(), 1, "focus node itself is the whole view");
    assert_eq!(graph.nodes[0].id, session.id);
    assert_eq!(graph.nodes[0].level, 0);
    assert!(graph.edges.is_empty());
}

#[tokio::test]
async fn test_dismissed_relation_hidden_from_expansion() {
    let h = harness().await;
    let user = alice();

    let a = h.captures.create_capture(&user, body_input("alpha #both")).await.unwrap();
    let b = h.captures.create_capture(&user, body_input("beta #both")).await.unwrap();
    let a_id = capture_id(&a);
    let b_id = capture_id(&b);

    assert!(h
        .captures
        .dismiss_capture_relation(&user, &a_id, &b_id)
        .await
        .unwrap());

    let expanded = h.expansion.get_by_id(&user, &a_id).await.unwrap();
    // Both captures still reachable through the shared tag
    assert_eq!(node_ids_with_label(&expanded, NodeLabel::Capture).len(), 2);
    assert!(
        !expanded.edges.iter().any(|e| e.kind == EdgeKind::DismissedRelation),
        "dismissed relations are stored but never rendered"
    );
}

#[tokio::test]
async fn test_capture_into_session_touches_last_modified() {
    let h = harness().await;
    let user = alice();

    let session = h.sessions.create_session(&user, "Morning notes").await.unwrap();
    let created = session.last_modified;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    h.captures
        .create_capture(
            &user,
            CreateCaptureInput {
                body: "in session".into(),
                parent_id: Some(session.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = h
        .repository
        .get_node(&user.id, &session.id)
        .await
        .unwrap()
        .expect("session should exist");
    match stored {
        GraphNode::Session(s) => {
            assert!(s.last_modified > created, "capture into session should touch it");
        }
        other => panic!("expected session node, got {:?}", other),
    }
}

#[tokio::test]
async fn test_capture_with_unknown_parent_is_ignored() {
    let h = harness().await;
    let user = alice();

    let graph = h
        .captures
        .create_capture(
            &user,
            CreateCaptureInput {
                body: "orphan".into(),
                parent_id: Some("urn:weft:session:missing".into()),
                ..Default::default()
            },
        )
        .await
        .expect("missing parent session must not fail the capture");
    assert_eq!(graph.nodes.len(), 1);
}

#[tokio::test]
async fn test_previous_can_point_at_session() {
    let h = harness().await;
    let user = alice();

    let session = h.sessions.create_session(&user, "Chain start").await.unwrap();
    let graph = h
        .captures
        .create_capture(
            &user,
            CreateCaptureInput {
                body: "chained".into(),
                previous_id: Some(session.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(graph
        .edges
        .iter()
        .any(|e| e.kind == EdgeKind::Previous && e.destination == session.id));
    assert!(graph.nodes.iter().any(|n| n.id == session.id && n.level == 1));
}

#[tokio::test]
async fn test_empty_body_rejected() {
    let h = harness().await;
    match h.captures.create_capture(&alice(), body_input("  ")).await {
        Err(Error::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other.map(|g| g.nodes)),
    }
}

#[tokio::test]
async fn test_html_body_indexed_as_plain_text() {
    let h = harness().await;
    let user = alice();

    h.captures
        .create_capture(&user, body_input("<p>styled <b>fragment</b></p>"))
        .await
        .unwrap();

    let results = h.expansion.search(&user, "fragment", 0, 10).await.unwrap();
    assert_eq!(node_ids_with_label(&results.graph, NodeLabel::Capture).len(), 1);
}
