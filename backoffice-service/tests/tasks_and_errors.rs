mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::test_app;
use uuid::Uuid;

#[tokio::test]
async fn unknown_task_is_not_found() {
    let app = test_app();
    let reply = app.send(Method::GET, &format!("/tasks/{}", Uuid::new_v4()), Some(Uuid::new_v4()), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["code"], "task_not_found");
    assert_eq!(reply.error_code.as_deref(), Some("task_not_found"));
}

#[tokio::test]
async fn tasks_are_private_to_their_tenant() {
    let app = test_app();
    let owner = Uuid::new_v4();
    let accepted = app.send(Method::POST, "/sellers", Some(owner), Some(json!({"name": "Ana"}))).await;
    let task_id: Uuid = accepted.body["task_id"].as_str().unwrap().parse().unwrap();
    app.state.jobs.wait(owner, task_id).await.unwrap();

    let stranger = app.send(Method::GET, &format!("/tasks/{task_id}"), Some(Uuid::new_v4()), None).await;
    assert_eq!(stranger.status, StatusCode::NOT_FOUND);

    let own = app.send(Method::GET, &format!("/tasks/{task_id}"), Some(owner), None).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["state"], "succeeded");
    assert_eq!(own.body["job"], "create_record");
}

#[tokio::test]
async fn failed_jobs_report_code_and_message() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let task = app.run(Method::GET, &format!("/locations/{}", Uuid::new_v4()), tenant, None).await;
    assert_eq!(task["state"], "failed");
    assert_eq!(task["error"]["code"], "location_not_found");
    assert!(task["error"]["message"].as_str().is_some());
    assert!(task.get("result").map_or(true, |r| r.is_null()));
}

#[tokio::test]
async fn health_and_metrics_are_exposed() {
    let app = test_app();
    let health = app.send(Method::GET, "/healthz", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body, "ok");

    app.send(Method::GET, &format!("/tasks/{}", Uuid::new_v4()), Some(Uuid::new_v4()), None).await;
    app.ok(Method::POST, "/sellers", Uuid::new_v4(), Some(json!({"name": "Ana"}))).await;

    let metrics = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(metrics.status, StatusCode::OK);
    let text = metrics.body.as_str().unwrap();
    assert!(text.contains("http_errors_total"));
    assert!(text.contains("code=\"task_not_found\""));
    assert!(text.contains("backoffice_jobs_submitted_total{job=\"create_record\"} 1"));
}
