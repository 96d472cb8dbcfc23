//! End-to-end engagement flows through [`RelationshipEngine`].
//!
//! Each test drives the public engine surface against the in-memory store:
//! records are created with their links, lifecycles are advanced and the
//! resulting relationship graph is checked from both directions.

use pretty_assertions::assert_eq;
use relink_core::prelude::*;
use relink_core::EngineError;
use relink_graph::WarningKind;
use relink_model::Trr;
use relink_store::{typed, Collection, EntityStore};
use relink_test_utils::{seed_pov, seed_project, setup_engine};

/// A POV with one TRR shows up linked both ways and validates clean.
#[tokio::test]
async fn create_link_and_advance_engagement() {
    let (_store, engine) = setup_engine();
    let project = engine
        .create_project(NewProject::new("P1", "Acme"))
        .await
        .unwrap();

    let pov = engine
        .create_pov(NewPov::new("Zero Trust POV"), &project, None)
        .await
        .unwrap();
    assert_eq!(pov.link, LinkWrite::NotRequested);

    let trr = engine
        .create_trr(
            NewTrr::new("Security Assessment"),
            &project,
            Some(pov.id.clone()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(trr.link, LinkWrite::Written);

    let graph = engine.project_relationship_graph(&project).await.unwrap();
    assert_eq!(graph.povs.len(), 1);
    assert_eq!(graph.trrs.len(), 1);
    assert_eq!(graph.relationships.pov_to_trr[&pov.id], vec![trr.id.clone()]);
    assert_eq!(graph.relationships.trr_to_pov[&trr.id], pov.id);

    let transition = engine.transition_pov_phase(&pov.id, "alice").await.unwrap();
    assert_eq!(transition.from, PovPhase::Planning);
    assert_eq!(transition.to, PovPhase::Discovery);
    assert_eq!(transition.updated_by, "alice");
    assert!(transition.auto_populated.is_none());

    let report = engine.validate_relationships(&project).await.unwrap();
    assert!(report.valid, "unexpected errors: {:?}", report.errors);
    assert!(report.warnings.is_empty());
}

/// Scenarios created against several POVs are listed by each of them.
#[tokio::test]
async fn scenario_links_are_bidirectional() {
    let (_store, engine) = setup_engine();
    let project = seed_project(&engine).await;
    let first = seed_pov(&engine, &project, "Network POV").await;
    let second = seed_pov(&engine, &project, "Identity POV").await;

    let scenario = engine
        .create_scenario(
            NewScenario::new("Lateral movement")
                .with_pov(first.clone())
                .with_pov(second.clone()),
            &project,
            None,
        )
        .await
        .unwrap();
    assert_eq!(scenario.link, LinkWrite::Written);

    let graph = engine.project_relationship_graph(&project).await.unwrap();
    assert_eq!(
        graph.relationships.scenario_to_pov[&scenario.id],
        vec![first.clone(), second.clone()]
    );
    assert_eq!(graph.relationships.pov_to_scenario[&first], vec![scenario.id.clone()]);
    assert_eq!(graph.relationships.pov_to_scenario[&second], vec![scenario.id.clone()]);

    let report = engine.validate_relationships(&project).await.unwrap();
    assert!(report.valid);
    assert_eq!(report.count_warnings(WarningKind::MissingBackReference), 0);
}

/// Opting out of relationship writes leaves the parent POV untouched.
#[tokio::test]
async fn unlinked_creation_only_writes_the_forward_reference() {
    let (store, engine) = setup_engine();
    let project = seed_project(&engine).await;
    let pov = seed_pov(&engine, &project, "POV").await;

    let trr = engine
        .create_trr(
            NewTrr::new("Review"),
            &project,
            Some(pov.clone()),
            Some(CreateOptions::unlinked()),
        )
        .await
        .unwrap();
    assert_eq!(trr.link, LinkWrite::NotRequested);

    let stored = store.get(Collection::Povs, pov.as_str()).await.unwrap().unwrap();
    assert_eq!(stored["trrIds"], serde_json::json!([]));

    let report = engine.validate_relationships(&project).await.unwrap();
    assert_eq!(report.count_warnings(WarningKind::MissingBackReference), 1);
}

/// Re-linking a TRR moves it out of its previous POV.
#[tokio::test]
async fn linking_trr_to_another_pov_detaches_it() {
    let (_store, engine) = setup_engine();
    let project = seed_project(&engine).await;
    let from = seed_pov(&engine, &project, "From").await;
    let to = seed_pov(&engine, &project, "To").await;
    let trr = engine
        .create_trr(NewTrr::new("Review"), &project, Some(from.clone()), None)
        .await
        .unwrap()
        .id;

    let outcome = engine.link_trr_to_pov(&trr, &to).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.back_reference, LinkWrite::Written);
    assert_eq!(outcome.previous_pov, Some(from.clone()));

    let graph = engine.project_relationship_graph(&project).await.unwrap();
    assert_eq!(graph.relationships.trr_to_pov[&trr], to);
    assert_eq!(graph.relationships.pov_to_trr[&to], vec![trr.clone()]);
    assert!(graph
        .relationships
        .pov_to_trr
        .get(&from)
        .map_or(true, Vec::is_empty));

    // linking again is a no-op
    let again = engine.link_trr_to_pov(&trr, &to).await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.previous_pov, None);
    assert!(engine.validate_relationships(&project).await.unwrap().valid);
}

/// Records of one project can never be linked into another.
#[tokio::test]
async fn projects_are_isolated() {
    let (_store, engine) = setup_engine();
    let first = seed_project(&engine).await;
    let second = engine
        .create_project(NewProject::new("P2", "Globex"))
        .await
        .unwrap();
    let foreign_pov = seed_pov(&engine, &first, "Acme POV").await;
    let local_pov = seed_pov(&engine, &second, "Globex POV").await;

    // the back-reference into the other project is refused
    let trr = engine
        .create_trr(NewTrr::new("Review"), &second, Some(foreign_pov.clone()), None)
        .await
        .unwrap();
    assert_eq!(trr.link, LinkWrite::Skipped);

    let report = engine.validate_relationships(&second).await.unwrap();
    assert!(!report.valid);
    assert_eq!(
        report.count_errors(relink_graph::ReferenceErrorKind::CrossProject),
        1
    );
    assert!(engine.validate_relationships(&first).await.unwrap().valid);

    let err = engine
        .link_trr_to_pov(&trr.id, &foreign_pov)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CrossProject { .. }));
    assert_eq!(err.code(), "CROSS_PROJECT_LINK");

    // moving it home fixes the graph
    engine.link_trr_to_pov(&trr.id, &local_pov).await.unwrap();
    assert!(engine.validate_relationships(&second).await.unwrap().valid);

    let first_graph = engine.project_relationship_graph(&first).await.unwrap();
    assert!(first_graph.trrs.is_empty());
}

#[tokio::test]
async fn trr_review_follows_the_state_machine() {
    let (store, engine) = setup_engine();
    let project = seed_project(&engine).await;
    let trr = engine
        .create_trr(NewTrr::new("Review"), &project, None, None)
        .await
        .unwrap()
        .id;

    let submitted = engine
        .transition_trr_status(&trr, TrrStatus::InReview, "alice")
        .await
        .unwrap();
    assert_eq!(submitted.event, TrrEvent::Submit);
    assert_eq!(submitted.to, TrrStatus::InReview);
    assert!(submitted.completed_at.is_none());

    let approved = engine
        .apply_trr_event(&trr, TrrEvent::Approve, "bob")
        .await
        .unwrap();
    assert_eq!(approved.to, TrrStatus::Approved);
    assert!(approved.completed_at.is_some());

    let stored: Trr = typed::fetch(store.as_ref(), trr.as_str()).await.unwrap().unwrap();
    assert_eq!(stored.status, TrrStatus::Approved);
    assert_eq!(stored.updated_by.as_deref(), Some("bob"));
    assert_eq!(stored.completed_at, approved.completed_at);

    let err = engine
        .apply_trr_event(&trr, TrrEvent::Submit, "alice")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
    let err = engine
        .transition_trr_status(&trr, TrrStatus::Pending, "alice")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
}

#[tokio::test]
async fn pov_phase_stops_at_completion() {
    let (_store, engine) = setup_engine_without_templates();
    let project = seed_project(&engine).await;
    let pov = seed_pov(&engine, &project, "POV").await;

    let mut last = None;
    for _ in 0..4 {
        last = Some(engine.transition_pov_phase(&pov, "alice").await.unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.to, PovPhase::Completion);
    assert!(last.completed_at.is_some());

    let err = engine.transition_pov_phase(&pov, "alice").await.unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
}

#[tokio::test]
async fn missing_records_are_not_found() {
    let (_store, engine) = setup_engine();
    let project = seed_project(&engine).await;

    let err = engine
        .transition_pov_phase(&PovId::from("pov-missing"), "alice")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let err = engine
        .validate_relationships(&ProjectId::from("nope"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let err = engine
        .create_pov(NewPov::new("POV"), &ProjectId::from("nope"), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = engine
        .link_scenario_to_pov(&ScenarioId::from("s-missing"), &PovId::from("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert!(engine.validate_relationships(&project).await.unwrap().valid);
}

fn setup_engine_without_templates() -> (
    std::sync::Arc<relink_store::MemoryStore>,
    RelationshipEngine,
) {
    relink_test_utils::setup_engine_with(
        EngineConfig::default().with_auto_populate_on_execution(false),
    )
}
