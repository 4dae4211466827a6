//! API tests against a server bound to an ephemeral port.

use std::time::Duration;

use db::models::{
    suggestion::{SuggestionBatch, SuggestionStatus, TaskSuggestion},
    task::{Phase, Pillar, Task, TaskSource},
    user::{CreateUser, Role, User},
};
use server::{Deployment, routes};
use services::services::{config::Config, events::EventKind};
use utils::response::ApiResponse;
use uuid::Uuid;

async fn spawn_app() -> (String, Deployment) {
    let deployment = Deployment::new_in_memory(Config::default()).await.unwrap();

    let app = routes::router(&deployment).with_state(deployment.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}/api"), deployment)
}

async fn seed_user(deployment: &Deployment, email: &str, role: Role) -> User {
    let data = CreateUser {
        email: email.to_string(),
        display_name: email.split('@').next().unwrap_or("user").to_string(),
        role: Some(role),
    };
    User::create(&deployment.db().pool, &data, Uuid::new_v4())
        .await
        .unwrap()
}

async fn create_project(
    client: &reqwest::Client,
    base: &str,
    actor: &User,
    name: &str,
) -> serde_json::Value {
    let res = client
        .post(format!("{base}/projects"))
        .header("X-User-Id", actor.id.to_string())
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    res.json::<serde_json::Value>().await.unwrap()["data"].clone()
}

async fn create_task(
    client: &reqwest::Client,
    base: &str,
    actor: &User,
    project_id: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let res = client
        .post(format!("{base}/projects/{project_id}/tasks"))
        .header("X-User-Id", actor.id.to_string())
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    res.json::<serde_json::Value>().await.unwrap()["data"].clone()
}

fn task_body(project_id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "project_id": project_id,
        "task_name": name,
        "pillar": "technical",
        "phase": "foundation",
    })
}

async fn points_of(client: &reqwest::Client, base: &str, user: &User) -> i64 {
    let res = client
        .get(format!("{base}/users/{}/progress", user.id))
        .header("X-User-Id", user.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    res.json::<serde_json::Value>().await.unwrap()["data"]["points"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn health_returns_success_envelope() {
    let (base, _deployment) = spawn_app().await;

    let res = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(res.status(), 200);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "ok");
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let (base, _deployment) = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{base}/projects")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("{base}/projects"))
        .header("X-User-Id", Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn first_user_bootstraps_as_owner() {
    let (base, _deployment) = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/users"))
        .json(&serde_json::json!({
            "email": "founder@agency.test",
            "display_name": "Founder",
            "role": "client",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    // requested role is ignored for the bootstrap account
    assert_eq!(body["data"]["role"], "owner");

    let res = client
        .post(format!("{base}/users"))
        .json(&serde_json::json!({
            "email": "second@agency.test",
            "display_name": "Second",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn clients_cannot_create_projects() {
    let (base, deployment) = spawn_app().await;
    let client_user = seed_user(&deployment, "client@agency.test", Role::Client).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/projects"))
        .header("X-User-Id", client_user.id.to_string())
        .json(&serde_json::json!({ "name": "Forbidden" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn project_visibility_follows_membership() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let manager = seed_user(&deployment, "manager@agency.test", Role::Manager).await;
    let client = reqwest::Client::new();

    let visible = create_project(&client, &base, &owner, "Visible").await;
    create_project(&client, &base, &owner, "Hidden").await;

    // not a member yet, sees nothing
    let res = client
        .get(format!("{base}/projects"))
        .header("X-User-Id", manager.id.to_string())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let res = client
        .post(format!("{base}/projects/{}/members", visible["id"].as_str().unwrap()))
        .header("X-User-Id", owner.id.to_string())
        .json(&serde_json::json!({ "user_id": manager.id, "can_edit": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("{base}/projects"))
        .header("X-User-Id", manager.id.to_string())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Visible"]);
}

#[tokio::test]
async fn completing_a_task_awards_points_once() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "Points").await;
    let project_id = project["id"].as_str().unwrap();
    let task = create_task(&client, &base, &owner, project_id, task_body(project_id, "Fix robots.txt")).await;
    let task_id = task["id"].as_str().unwrap();

    let res = client
        .post(format!("{base}/tasks/{task_id}/status"))
        .header("X-User-Id", owner.id.to_string())
        .json(&serde_json::json!({ "status": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"]["completed_at"].is_string());

    assert_eq!(points_of(&client, &base, &owner).await, 25);

    // reopening and completing again must not double-award
    for status in ["todo", "done"] {
        client
            .post(format!("{base}/tasks/{task_id}/status"))
            .header("X-User-Id", owner.id.to_string())
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await
            .unwrap();
    }
    assert_eq!(points_of(&client, &base, &owner).await, 25);
}

#[tokio::test]
async fn linking_a_document_awards_points() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "Docs").await;
    let project_id = project["id"].as_str().unwrap();
    let task = create_task(&client, &base, &owner, project_id, task_body(project_id, "Write brief")).await;

    let res = client
        .post(format!("{base}/projects/{project_id}/documents"))
        .header("X-User-Id", owner.id.to_string())
        .json(&serde_json::json!({
            "title": "Content brief",
            "url": "https://docs.example/brief",
            "kind": "brief",
            "task_id": task["id"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    assert_eq!(points_of(&client, &base, &owner).await, 10);
}

#[tokio::test]
async fn timeline_returns_padded_window_and_bars() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "Gantt").await;
    let project_id = project["id"].as_str().unwrap();

    let mut body = task_body(project_id, "Site audit");
    body["start_date"] = "2026-03-10".into();
    body["end_date"] = "2026-03-20".into();
    create_task(&client, &base, &owner, project_id, body).await;
    create_task(&client, &base, &owner, project_id, task_body(project_id, "Unscheduled")).await;

    let res = client
        .get(format!("{base}/projects/{project_id}/timeline"))
        .header("X-User-Id", owner.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let layout = res.json::<serde_json::Value>().await.unwrap()["data"].clone();

    // one scheduled task: window pads its range by a week on both sides
    assert_eq!(layout["window"]["start"], "2026-03-03");
    assert_eq!(layout["window"]["end"], "2026-03-27");

    let weeks: Vec<&str> = layout["weeks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w.as_str().unwrap())
        .collect();
    assert_eq!(weeks, vec!["2026-03-01", "2026-03-08", "2026-03-15", "2026-03-22"]);

    let rows = layout["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let scheduled = rows
        .iter()
        .find(|r| r["task_name"] == "Site audit")
        .unwrap();
    let bar = &scheduled["bar"];
    let left = bar["left_pct"].as_f64().unwrap();
    let width = bar["width_pct"].as_f64().unwrap();
    assert!((left - 100.0 * 7.0 / 24.0).abs() < 1e-6);
    assert!((width - 100.0 * 10.0 / 24.0).abs() < 1e-6);

    let unscheduled = rows
        .iter()
        .find(|r| r["task_name"] == "Unscheduled")
        .unwrap();
    assert!(unscheduled["bar"].is_null());
}

#[tokio::test]
async fn gap_analysis_flags_uncovered_pillars() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "Gaps").await;
    let project_id = project["id"].as_str().unwrap();
    create_task(&client, &base, &owner, project_id, task_body(project_id, "Crawl audit")).await;

    let res = client
        .get(format!("{base}/projects/{project_id}/gap-analysis"))
        .header("X-User-Id", owner.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let report = res.json::<serde_json::Value>().await.unwrap()["data"].clone();

    assert_eq!(report["cells"].as_array().unwrap().len(), 12);
    let uncovered: Vec<&str> = report["uncovered_pillars"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(uncovered, vec!["on_page", "off_page", "analytics"]);
    let coverage = report["coverage_pct"].as_f64().unwrap();
    assert!((coverage - 100.0 / 12.0).abs() < 1e-6);
    // the least covered pillar wins the focus, catalog order breaking ties
    assert_eq!(report["suggested_focus"], "on_page");
}

#[tokio::test]
async fn latest_suggestions_is_null_before_any_batch() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "Empty").await;
    let project_id = project["id"].as_str().unwrap();

    let res = client
        .get(format!("{base}/projects/{project_id}/suggestions/latest"))
        .header("X-User-Id", owner.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn accepting_a_completed_batch_materializes_tasks() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "AI plan").await;
    let project_id = Uuid::parse_str(project["id"].as_str().unwrap()).unwrap();

    // batch completed out of band, as the background generator would leave it
    let pool = &deployment.db().pool;
    let batch_id = Uuid::new_v4();
    SuggestionBatch::create(pool, batch_id, project_id, None).await.unwrap();
    let suggestions = vec![
        TaskSuggestion {
            task_name: "Fix canonical tags".to_string(),
            description: Some("Audit and repair canonical URLs".to_string()),
            pillar: Pillar::Technical,
            phase: Phase::Foundation,
            rationale: None,
        },
        TaskSuggestion {
            task_name: "Pitch guest posts".to_string(),
            description: None,
            pillar: Pillar::OffPage,
            phase: Phase::Authority,
            rationale: Some("No off-page coverage yet".to_string()),
        },
    ];
    SuggestionBatch::update_suggestions(pool, batch_id, &suggestions).await.unwrap();
    SuggestionBatch::update_status(pool, batch_id, SuggestionStatus::Completed, None)
        .await
        .unwrap();

    let res = client
        .post(format!("{base}/suggestions/{batch_id}/accept"))
        .header("X-User-Id", owner.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: ApiResponse<Vec<Task>> = res.json().await.unwrap();
    assert!(body.is_success());
    assert_eq!(body.message(), Some("created 2 tasks from suggestions"));
    let tasks = body.into_data().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.source == TaskSource::AiSuggested));

    // 5 points per accepted suggestion
    assert_eq!(points_of(&client, &base, &owner).await, 10);

    // accepting a pending batch is refused
    let pending_id = Uuid::new_v4();
    SuggestionBatch::create(pool, pending_id, project_id, None).await.unwrap();
    let res = client
        .post(format!("{base}/suggestions/{pending_id}/accept"))
        .header("X-User-Id", owner.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 409);
}

#[tokio::test]
async fn task_changes_reach_event_subscribers() {
    let (base, deployment) = spawn_app().await;
    let owner = seed_user(&deployment, "owner@agency.test", Role::Owner).await;
    let client = reqwest::Client::new();

    let project = create_project(&client, &base, &owner, "Live").await;
    let project_id = project["id"].as_str().unwrap();

    let mut subscriber = deployment.events().connect();
    create_task(&client, &base, &owner, project_id, task_body(project_id, "Watched")).await;

    let event = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, EventKind::TaskCreated);
    assert_eq!(event.project_id, Some(Uuid::parse_str(project_id).unwrap()));
    assert_eq!(event.payload["task"]["task_name"], "Watched");
    deployment.events().disconnect(subscriber);
}
