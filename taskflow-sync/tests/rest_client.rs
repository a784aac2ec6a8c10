use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taskflow_core::{
    CompletionContext, CompletionOutcome, CountSource, EventBus, EventKind, ProjectStore,
    SectionFilter, SectionStore, StoreError, TaskLifecycle, TaskStore, ViewTag,
};
use taskflow_sync::RestClient;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn client(server: &MockServer) -> RestClient {
    RestClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetch_counts_sends_callers_today() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/count/"))
        .and(query_param("today", "2025-03-09"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inbox": 3, "today": 1, "upcoming": 4, "completed": 10,
            "projects": {"7": 2, "9": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let counts = client(&server).fetch_counts(day("2025-03-09")).await.unwrap();
    assert_eq!(counts.inbox, 3);
    assert_eq!(counts.completed, 10);
    assert_eq!(counts.project(7), 2);
    assert_eq!(counts.project(9), 0);
}

#[tokio::test]
async fn missing_task_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/42/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).get_task(42).await.unwrap_err();
    assert!(
        matches!(err, StoreError::NotFound { kind: "task", id: 42 }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn server_error_is_rejected_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/5/complete/"))
        .and(body_json(json!({"completed": false})))
        .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
        .mount(&server)
        .await;

    let err = client(&server).set_completed(5, false).await.unwrap_err();
    match err {
        StoreError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database locked");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn existence_checks_read_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects/exists/"))
        .and(query_param("name", "Garden"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exists": true})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sections/exists/"))
        .and(query_param("project_id", "null"))
        .and(query_param("view", "inbox"))
        .and(query_param("name", "Completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exists": false})))
        .mount(&server)
        .await;

    let rest = client(&server);
    assert!(rest.project_name_exists("Garden").await.unwrap());
    let inbox = SectionFilter { project_id: None, view: Some(ViewTag::Inbox) };
    assert!(!rest.section_name_exists(&inbox, "Completed").await.unwrap());
}

#[tokio::test]
async fn completion_over_http_creates_bucket_moves_then_marks() {
    let server = MockServer::start().await;
    let today = day("2025-01-10");

    Mock::given(method("GET"))
        .and(path("/api/tasks/11/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11, "name": "Water plants", "current_view": ["today"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sections/"))
        .and(query_param("project_id", "null"))
        .and(query_param("view", "today"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "name": "Morning", "current_view": ["today"]}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sections/"))
        .and(body_json(json!({"name": "Completed", "current_view": ["today"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 40, "name": "Completed", "current_view": ["today"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/11/move/"))
        .and(body_json(json!({"project_id": null, "section_id": 40})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11, "name": "Water plants", "section_id": 40, "current_view": ["today"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/11/"))
        .and(body_json(json!({"completed": true, "completed_date": "2025-01-10"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11, "name": "Water plants", "section_id": 40, "current_view": ["today"],
            "completed": true, "completed_date": "2025-01-10"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        bus.subscribe_any_change(move |kind| seen.lock().push(kind));
    }
    let lifecycle = TaskLifecycle::new(Arc::new(client(&server)), bus);

    let outcome = lifecycle.complete(11, CompletionContext::today(), today).await.unwrap();
    let CompletionOutcome::Completed { task, section, section_created } = outcome else {
        panic!("expected a completion, got {outcome:?}");
    };
    assert!(section_created);
    assert_eq!(section.id, 40);
    assert!(task.completed);
    assert_eq!(task.section_id, Some(40));
    assert_eq!(task.completed_date, Some(today));
    assert_eq!(*seen.lock(), vec![EventKind::TaskCompleted]);
}

#[tokio::test]
async fn failed_move_aborts_completion_without_events() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tasks/12/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12, "name": "Call plumber", "project_id": 4
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sections/"))
        .and(query_param("project_id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 8, "name": "Completed", "project_id": 4}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/12/move/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/12/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(parking_lot::Mutex::new(0usize));
    {
        let seen = seen.clone();
        bus.subscribe_all(move |_| *seen.lock() += 1);
    }
    let lifecycle = TaskLifecycle::new(Arc::new(client(&server)), bus);

    let err = lifecycle
        .complete(12, CompletionContext::project(4), day("2025-01-10"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"), "unexpected error: {err}");
    assert_eq!(*seen.lock(), 0);
}

#[tokio::test]
async fn uncomplete_over_http_clears_flag_and_date_in_one_patch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tasks/21/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 21, "name": "Renew passport", "section_id": 40,
            "completed": true, "completed_date": "2025-01-09"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/21/"))
        .and(body_json(json!({"completed": false, "completed_date": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 21, "name": "Renew passport", "section_id": 40, "completed": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lifecycle = TaskLifecycle::new(Arc::new(client(&server)), Arc::new(EventBus::new()));
    let task = lifecycle.uncomplete(21).await.unwrap();
    assert!(!task.completed);
    assert_eq!(task.completed_date, None);
    assert_eq!(task.section_id, Some(40));
}

#[tokio::test]
async fn archive_over_http_flags_and_detaches_in_one_patch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tasks/22/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 22, "name": "File taxes", "project_id": 4, "section_id": 8,
            "completed": true, "completed_date": "2025-01-09"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/22/"))
        .and(body_json(json!({"section_id": null, "totally_completed": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 22, "name": "File taxes", "project_id": 4,
            "completed": true, "totally_completed": true, "completed_date": "2025-01-09"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lifecycle = TaskLifecycle::new(Arc::new(client(&server)), Arc::new(EventBus::new()));
    let task = lifecycle.archive(22).await.unwrap();
    assert!(task.totally_completed);
    assert_eq!(task.section_id, None);
    assert_eq!(task.project_id, Some(4));
}
