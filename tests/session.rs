mod common;

use std::sync::Arc;

use assert_matches::assert_matches;

use dredge_loader::display::{SortPath, SortSpec};
use dredge_loader::domain::{ProjectSource, SortOrder};
use dredge_loader::error::DredgeError;
use dredge_loader::session::{Request, Response, Session};
use dredge_loader::store::{KeyValueStore, MemoryStore};

use common::{MockClient, project_client, session, startup};

fn names(session: &Session) -> Vec<String> {
    session
        .view()
        .displayed
        .iter()
        .map(|row| row.transcript.name.clone())
        .collect()
}

fn sort(path: &str, order: SortOrder) -> Option<SortSpec> {
    Some(SortSpec {
        path: path.parse::<SortPath>().unwrap(),
        order,
    })
}

#[tokio::test]
async fn rows_follow_comparison_and_sort() {
    let client = Arc::new(project_client());
    let (mut session, _) = session(&client);
    session.load_project().await.unwrap();
    session
        .set_saved_transcripts(["geneZ", "geneX", "geneY"])
        .unwrap();

    let rows = session.update_displayed_transcripts(None).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.saved && row.treatment_a_mean.is_none()));

    session.set_pairwise_comparison("A", "B").await.unwrap();
    assert_eq!(names(&session), vec!["geneY", "geneX", "geneZ"]);

    let gene_x = &session.view().displayed[1];
    assert_eq!(gene_x.transcript.p_value, Some(0.2));
    assert_eq!(gene_x.treatment_a_mean, Some(4.0));
    assert_eq!(gene_x.treatment_a_median, Some(4.0));
    assert_eq!(gene_x.treatment_b_mean, Some(1.0));
    assert_eq!(session.view().displayed[2].transcript.p_value, None);
    assert_eq!(session.view().displayed[2].treatment_b_median, Some(0.0));

    session
        .update_displayed_transcripts(sort("transcript.pValue", SortOrder::Desc))
        .unwrap();
    assert_eq!(names(&session), vec!["geneX", "geneY", "geneZ"]);

    session
        .update_displayed_transcripts(sort("transcript.name", SortOrder::Desc))
        .unwrap();
    assert_eq!(names(&session), vec!["geneZ", "geneY", "geneX"]);

    session.set_brushed_transcripts(["geneY"]).unwrap();
    assert_eq!(names(&session), vec!["geneY"]);
    assert!(session.view().displayed[0].saved);
}

#[tokio::test]
async fn rows_serialize_with_view_field_names() {
    let client = Arc::new(project_client());
    let (mut session, _) = session(&client);
    session.load_project().await.unwrap();
    session.set_saved_transcripts(["geneY"]).unwrap();
    session.set_pairwise_comparison("A", "B").await.unwrap();

    let json = serde_json::to_value(&session.view().displayed[0]).unwrap();
    assert_eq!(json["transcript"]["logFC"], -2.0);
    assert_eq!(json["treatmentB_AbundanceMean"], 8.0);
    assert_eq!(json["saved"], true);
}

#[tokio::test]
async fn saved_transcripts_persist_for_global_projects() {
    let client = Arc::new(project_client());
    let (mut session, store) = session(&client);
    store.set("/study-watched", "geneY\ngeneX").unwrap();
    session.load_project().await.unwrap();
    assert_eq!(session.export_saved_transcripts(), "geneY\ngeneX");

    let added = session
        .import_saved_transcripts("geneZ\n\ngeneX\nunknown\n")
        .unwrap();
    assert_eq!(added, 2);
    assert_eq!(
        store.get("/study-watched").unwrap().as_deref(),
        Some("geneZ\ngeneX\nunknown\ngeneY")
    );

    session.set_pairwise_comparison("A", "B").await.unwrap();
    let unknown = session
        .view()
        .displayed
        .iter()
        .find(|row| row.transcript.name == "unknown")
        .unwrap();
    assert_eq!(unknown.treatment_a_mean, None);
}

#[tokio::test]
async fn local_projects_never_touch_the_store() {
    let client = Arc::new(project_client());
    let store = Arc::new(MemoryStore::new());
    store.set("/study-watched", "geneX").unwrap();
    let mut startup = startup();
    startup.source = ProjectSource::Local;
    let mut session = Session::new(startup, client.clone(), store.clone());

    session.load_project().await.unwrap();
    assert!(session.view().saved.is_empty());
    session.set_saved_transcripts(["geneY"]).unwrap();
    assert_eq!(store.get("/study-watched").unwrap().as_deref(), Some("geneX"));
}

#[tokio::test]
async fn requests_dispatch_to_operations() {
    let client = Arc::new(project_client());
    let (mut session, _) = session(&client);

    assert_matches!(
        session.handle(Request::GetDefaultPairwiseComparison).await,
        Err(DredgeError::NoProject)
    );

    let response = session.handle(Request::LoadProjectConfig).await.unwrap();
    assert_matches!(
        response,
        Response::ProjectConfig { config: Some(config) } if config.label.as_deref() == Some("Heat study")
    );

    let response = session.handle(Request::LoadProject).await.unwrap();
    assert_matches!(
        response,
        Response::ProjectLoaded(summary) if summary.treatments == ["A", "B", "C"] && summary.transcripts == 3
    );

    let response = session
        .handle(Request::GetDefaultPairwiseComparison)
        .await
        .unwrap();
    assert_matches!(
        response,
        Response::DefaultPairwiseComparison { pair: Some((a, b)) } if a == "A" && b == "B"
    );

    let response = session
        .handle(Request::SetPairwiseComparison {
            a: "B".to_string(),
            b: "A".to_string(),
        })
        .await
        .unwrap();
    assert_matches!(
        response,
        Response::PairwiseComparison { records: 2, cached: false, resort: true, .. }
    );

    session
        .handle(Request::SetSavedTranscripts {
            ids: vec!["geneX".to_string()],
        })
        .await
        .unwrap();
    let response = session
        .handle(Request::UpdateDisplayedTranscripts { sort: None })
        .await
        .unwrap();
    assert_matches!(
        response,
        Response::DisplayedTranscripts { rows } if rows.len() == 1 && rows[0].transcript.log_fc == Some(-1.5)
    );

    let response = session
        .handle(Request::ImportSavedTranscripts {
            text: "geneY\n".to_string(),
        })
        .await
        .unwrap();
    assert_matches!(response, Response::Imported { added: 1, total: 2 });

    let response = session
        .handle(Request::ExportSavedTranscripts)
        .await
        .unwrap();
    assert_matches!(response, Response::Exported { text } if text == "geneY\ngeneX");

    session.handle(Request::ResetProject).await.unwrap();
    assert!(session.project().is_none());
    assert!(session.status_log().events().is_empty());
    assert!(session.view().saved.is_empty());
}

#[tokio::test]
async fn reset_drops_the_pairwise_cache() {
    let client = Arc::new(project_client());
    let (mut session, _) = session(&client);
    session.load_project().await.unwrap();
    session.set_pairwise_comparison("A", "B").await.unwrap();

    session.reset_project();
    session.load_project().await.unwrap();
    let (_, cached) = session.set_pairwise_comparison("A", "B").await.unwrap();
    assert!(!cached);
    assert_eq!(client.calls_matching("pairwise_tests/"), 4);
    assert_eq!(client.calls_matching("project.json"), 1);
}

#[tokio::test]
async fn no_configuration_url_means_no_project() {
    let client = Arc::new(MockClient::new());
    let store = Arc::new(MemoryStore::new());
    let startup = dredge_loader::config::StartupConfig::global(None, "/");
    let mut session = Session::new(startup, client.clone(), store);

    assert_eq!(session.load_project_config().await.unwrap(), None);
    assert_matches!(session.load_project().await, Err(DredgeError::NoProject));
    assert!(client.calls().is_empty());
}
