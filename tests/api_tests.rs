use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn start(app: &Router, concept: &str) -> Value {
    let (status, body) = send(
        app,
        post_json(
            "/api/attempts",
            json!({ "learnerId": "learner-api", "conceptId": concept }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    body["data"].clone()
}

#[tokio::test]
async fn test_health_root() {
    let app = common::create_test_app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app();
    let (status, body) = send(&app, get("/health/live")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_concepts() {
    let app = common::create_test_app();
    let (status, body) = send(&app, get("/api/concepts")).await;

    assert_eq!(status, StatusCode::OK);
    let concepts = body["data"].as_array().unwrap();
    assert_eq!(concepts.len(), 3);
    let fractions = concepts.iter().find(|c| c["id"] == "fractions").unwrap();
    assert_eq!(fractions["itemCount"], 16);
    assert_eq!(fractions["objectiveIds"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_start_attempt_hides_answer_key() {
    let app = common::create_test_app();
    let attempt = start(&app, "fractions").await;

    assert_eq!(attempt["status"], "active");
    assert_eq!(attempt["progress"]["askedCount"], 0);
    let question = &attempt["question"];
    assert!(question["itemId"].is_string());
    assert!(question.get("correctIndex").is_none());
    assert!(question.get("misconceptionTags").is_none());
    assert!(attempt["result"].is_null());
}

#[tokio::test]
async fn test_answer_flow_and_replay() {
    let app = common::create_test_app();
    let attempt = start(&app, "ratios").await;
    let attempt_id = attempt["attemptId"].as_str().unwrap().to_string();
    let item_id = attempt["question"]["itemId"].as_str().unwrap().to_string();
    let selected = common::correct_index("ratios", &item_id);
    let uri = format!("/api/attempts/{attempt_id}/answers");
    let payload = json!({ "itemId": item_id, "selectedIndex": selected });

    let (status, first) = send(&app, post_json(&uri, payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["isCorrect"], true);
    assert_eq!(first["data"]["misconceptionTag"], "correct");
    assert_eq!(first["data"]["replayed"], false);
    assert_eq!(first["data"]["attempt"]["progress"]["askedCount"], 1);

    let (status, second) = send(&app, post_json(&uri, payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["replayed"], true);
    assert_eq!(second["data"]["attempt"]["progress"]["askedCount"], 1);

    let (status, current) = send(&app, get(&format!("/api/attempts/{attempt_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["data"]["progress"]["askedCount"], 1);
}

#[tokio::test]
async fn test_attempt_completes_with_result() {
    let app = common::create_test_app();
    let mut attempt = start(&app, "linear_equations").await;
    let attempt_id = attempt["attemptId"].as_str().unwrap().to_string();
    let uri = format!("/api/attempts/{attempt_id}/answers");

    for _ in 0..7 {
        if attempt["status"] != "active" {
            break;
        }
        let item_id = attempt["question"]["itemId"].as_str().unwrap().to_string();
        let selected = common::wrong_index("linear_equations", &item_id);
        let (status, body) = send(
            &app,
            post_json(&uri, json!({ "itemId": item_id, "selectedIndex": selected })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        attempt = body["data"]["attempt"].clone();
    }

    assert_eq!(attempt["status"], "completed");
    let result = &attempt["result"];
    assert_eq!(result["band"], "heavy");
    assert_eq!(result["finishReason"], "stopping_rule");
    assert!(!result["misconceptions"].as_array().unwrap().is_empty());
    assert!(attempt["question"].is_null());
}

#[tokio::test]
async fn test_error_mapping() {
    let app = common::create_test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/attempts",
            json!({ "learnerId": "l", "conceptId": "astronomy" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app, get("/api/attempts/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let attempt = start(&app, "fractions").await;
    let attempt_id = attempt["attemptId"].as_str().unwrap();
    let item_id = attempt["question"]["itemId"].as_str().unwrap();
    let uri = format!("/api/attempts/{attempt_id}/answers");

    let (status, body) = send(
        &app,
        post_json(&uri, json!({ "itemId": item_id, "selectedIndex": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SELECTION");

    let (status, body) = send(
        &app,
        post_json(&uri, json!({ "itemId": "fractions.ghost.l1", "selectedIndex": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ITEM_NOT_PENDING");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = common::create_test_app();
    let (status, body) = send(&app, get("/api/nowhere")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
