//! Ticket mutation endpoints over the in-process router.

mod common;

use axum::http::StatusCode;
use common::{TestConfig, TestFixture};
use serde_json::json;

async fn first_feature_ticket(fixture: &TestFixture, project_id: &str) -> String {
    let response = fixture
        .get(&format!("/api/v1/projects/{}/tickets?type=feature", project_id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    response.body["tickets"][0]["id"]
        .as_str()
        .expect("no feature ticket")
        .to_string()
}

#[tokio::test]
async fn test_get_ticket_includes_dependencies() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    let response = fixture.get(&format!("/api/v1/tickets/{}", ticket_id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], ticket_id.as_str());
    assert_eq!(response.body["status"], "pending");
    let deps = response.body["dependencies"].as_array().unwrap();
    assert!(!deps.is_empty(), "feature tickets depend on setup");
}

#[tokio::test]
async fn test_get_unknown_ticket_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/tickets/does-not-exist").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_status_transition() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/status", ticket_id),
            json!({ "status": "in_progress" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["status"], "in_progress");
}

#[tokio::test]
async fn test_illegal_transition_is_conflict() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    // pending may not jump straight to completed
    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/status", ticket_id),
            json!({ "status": "completed" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_completed_ticket_counts_toward_project() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    for status in ["in_progress", "completed"] {
        let response = fixture
            .post(
                &format!("/api/v1/tickets/{}/status", ticket_id),
                json!({ "status": status }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let project = fixture.get(&format!("/api/v1/projects/{}", project_id)).await;
    assert_eq!(project.body["completed_tickets"], 1);

    // completed is terminal
    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/status", ticket_id),
            json!({ "status": "in_progress" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_assign_moves_pending_to_assigned() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/assign", ticket_id),
            json!({ "assignee": "dana" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["assignee"], "dana");
    assert_eq!(response.body["status"], "assigned");
}

#[tokio::test]
async fn test_assign_blank_is_bad_request() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/assign", ticket_id),
            json!({ "assignee": "   " }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_ticket_fields() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    let response = fixture
        .patch(
            &format!("/api/v1/tickets/{}", ticket_id),
            json!({ "title": "Polish login", "priority": "critical", "commit_count": 3 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["title"], "Polish login");
    assert_eq!(response.body["priority"], "critical");
    assert_eq!(response.body["commit_count"], 3);
}

#[tokio::test]
async fn test_empty_patch_is_bad_request() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let ticket_id = first_feature_ticket(&fixture, &project_id).await;

    let response = fixture
        .patch(&format!("/api/v1/tickets/{}", ticket_id), json!({}))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_tickets_filters_and_paginates() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;

    let all = fixture
        .get(&format!("/api/v1/projects/{}/tickets", project_id))
        .await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["total"], 3);
    let order: Vec<u64> = all.body["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["order_index"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![0, 1, 2]);

    let setup = fixture
        .get(&format!("/api/v1/projects/{}/tickets?type=setup", project_id))
        .await;
    assert_eq!(setup.body["total"], 1);

    let page = fixture
        .get(&format!("/api/v1/projects/{}/tickets?limit=1&offset=1", project_id))
        .await;
    assert_eq!(page.body["tickets"].as_array().unwrap().len(), 1);
    assert_eq!(page.body["total"], 3);
    assert_eq!(page.body["tickets"][0]["order_index"], 1);
}

#[tokio::test]
async fn test_list_tickets_rejects_unknown_status() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.create_project("Filters").await;

    let response = fixture
        .get(&format!("/api/v1/projects/{}/tickets?status=done", project_id))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_token_required_for_mutations() {
    let fixture = TestFixture::with_config(TestConfig {
        signed_tokens: true,
        ..Default::default()
    })
    .await;

    let response = fixture
        .post("/api/v1/projects", json!({ "name": "Locked" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let token = fixture.token("dana");
    let response = fixture
        .request_with_token(
            "POST",
            "/api/v1/projects",
            Some(json!({ "name": "Unlocked" })),
            &token,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    // Health stays open for probes
    let health = fixture.get("/api/v1/health").await;
    assert_eq!(health.status, StatusCode::OK);
}
