//! API integration tests
//!
//! Each test drives the full router over a fresh in-memory store.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use equiplend_server::{api, config::AppConfig, repository::Repository, AppState};

const SECRET: &str = "integration-test-secret";

fn app() -> Router {
    let state = AppState::new(&AppConfig::in_memory(SECRET), Repository::in_memory());
    api::create_router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, name: &str, email: &str, role: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret1", "role": role })),
    )
    .await
}

/// Register an account and return (token, user id)
async fn sign_up(app: &Router, name: &str, role: &str) -> (String, i64) {
    let email = format!("{}@school.test", name.to_lowercase());
    let (status, _) = register(app, name, &email, role).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_i64().unwrap(),
    )
}

async fn add_equipment(app: &Router, admin: &str, name: &str, category: &str, quantity: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/equipment",
        Some(admin),
        Some(json!({ "name": name, "category": category, "totalQuantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

async fn request_equipment(app: &Router, student: &str, equipment_id: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/request",
        Some(student),
        Some(json!({ "equipmentId": equipment_id })),
    )
    .await
}

async fn available_count(app: &Router, token: &str, equipment_id: i64) -> i64 {
    let (status, body) = send(app, Method::GET, &format!("/api/equipment/{}", equipment_id), Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    body["availableCount"].as_i64().unwrap()
}

#[tokio::test]
async fn test_banner_and_health() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "School Equipment Lending Portal Backend Running");

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_then_login_returns_role() {
    let app = app();
    let (status, body) = register(&app, "Ada", "Ada@School.test", "admin").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Registration successful");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@school.test", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 2 * 3600);
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["email"], "ada@school.test");
    assert!(body["user"].get("password").is_none());

    let token = body["token"].as_str().unwrap();
    let (status, me) = send(&app, Method::GET, "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Ada");
}

#[tokio::test]
async fn test_register_and_login_failures() {
    let app = app();
    register(&app, "Bo", "bo@school.test", "student").await;

    let (status, body) = register(&app, "Bo again", "bo@school.test", "staff").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");

    let (status, _) = register(&app, "Cy", "cy@school.test", "janitor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@school.test", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User not found");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "bo@school.test", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Incorrect password");
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/equipment", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized - no token provided");

    let (status, body) = send(&app, Method::GET, "/api/request", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized - invalid or expired token");
}

#[tokio::test]
async fn test_student_cannot_manage_equipment() {
    let app = app();
    let (student, _) = sign_up(&app, "Dana", "student").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/equipment",
        Some(&student),
        Some(json!({ "name": "Football", "category": "Sports", "totalQuantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden - insufficient role");
}

#[tokio::test]
async fn test_equipment_crud_and_filters() {
    let app = app();
    let (admin, _) = sign_up(&app, "Eve", "admin").await;

    let microscope = add_equipment(&app, &admin, "Microscope", "Lab", 2).await;
    let ball = add_equipment(&app, &admin, "Football", "Sports", 5).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/equipment/{}", microscope), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availableCount"], 2);
    assert_eq!(body["condition"], "good");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/equipment",
        Some(&admin),
        Some(json!({ "name": "Microscope", "category": "Lab", "totalQuantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, list) = send(&app, Method::GET, "/api/equipment?category=Sports", Some(&admin), None).await;
    let names: Vec<&str> = list.as_array().unwrap().iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Football"]);

    let (status, _) = send(&app, Method::GET, "/api/equipment?available=maybe", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/equipment/{}", ball),
        Some(&admin),
        Some(json!({ "availableCount": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/equipment/{}", ball),
        Some(&admin),
        Some(json!({ "totalQuantity": 3, "condition": "worn" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalQuantity"], 3);
    assert_eq!(body["availableCount"], 3);
    assert_eq!(body["condition"], "worn");

    let (status, body) = send(&app, Method::DELETE, &format!("/api/equipment/{}", ball), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Equipment deleted");

    let (status, _) = send(&app, Method::GET, &format!("/api/equipment/{}", ball), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/equipment/abc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_lifecycle_moves_stock() {
    let app = app();
    let (admin, _) = sign_up(&app, "Finn", "admin").await;
    let (staff, _) = sign_up(&app, "Gia", "staff").await;
    let (student, student_id) = sign_up(&app, "Hal", "student").await;
    let camera = add_equipment(&app, &admin, "Camera", "Media", 3).await;

    let (status, created) = request_equipment(&app, &student, camera).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["user"]["id"], student_id);
    assert_eq!(created["equipment"]["name"], "Camera");
    assert_eq!(available_count(&app, &admin, camera).await, 3);

    let (status, body) = request_equipment(&app, &student, camera).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Active request already exists for this equipment");

    let id = created["id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::PATCH, &format!("/api/request/{}/approve", id), Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = send(&app, Method::PATCH, &format!("/api/request/{}/approve", id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert!(approved["approvedAt"].is_string());
    assert_eq!(available_count(&app, &admin, camera).await, 2);

    let (status, body) = send(&app, Method::PATCH, &format!("/api/request/{}/approve", id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Request not found or already processed");
    assert_eq!(available_count(&app, &admin, camera).await, 2);

    let (status, returned) = send(&app, Method::PATCH, &format!("/api/request/{}/return", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");
    assert_eq!(available_count(&app, &admin, camera).await, 3);

    let (status, body) = send(&app, Method::PATCH, &format!("/api/request/{}/return", id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Request not found or not approved");
    assert_eq!(available_count(&app, &admin, camera).await, 3);

    // Finished requests no longer block a new one
    let (status, _) = request_equipment(&app, &student, camera).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reject_leaves_stock_alone() {
    let app = app();
    let (admin, _) = sign_up(&app, "Ivy", "admin").await;
    let (student, _) = sign_up(&app, "Jon", "student").await;
    let kit = add_equipment(&app, &admin, "Robot Kit", "Lab", 1).await;

    let (_, created) = request_equipment(&app, &student, kit).await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::PATCH, &format!("/api/request/{}/reject", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert_eq!(available_count(&app, &admin, kit).await, 1);

    let (status, _) = send(&app, Method::PATCH, &format!("/api/request/{}/return", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::PATCH, "/api/request/9999/reject", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unavailable_equipment_cannot_be_requested() {
    let app = app();
    let (admin, _) = sign_up(&app, "Kim", "admin").await;
    let (first, _) = sign_up(&app, "Lee", "student").await;
    let (second, _) = sign_up(&app, "Max", "student").await;
    let tablet = add_equipment(&app, &admin, "Tablet", "Media", 1).await;

    let (_, created) = request_equipment(&app, &first, tablet).await;
    let id = created["id"].as_i64().unwrap();
    send(&app, Method::PATCH, &format!("/api/request/{}/approve", id), Some(&admin), None).await;
    assert_eq!(available_count(&app, &admin, tablet).await, 0);

    let (status, body) = request_equipment(&app, &second, tablet).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Equipment not available");

    let (status, body) = request_equipment(&app, &second, 4242).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Equipment not available");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/request",
        Some(&admin),
        Some(json!({ "equipmentId": tablet })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_approving_the_last_unit_twice_fails() {
    let app = app();
    let (admin, _) = sign_up(&app, "Ned", "admin").await;
    let (first, _) = sign_up(&app, "Oli", "student").await;
    let (second, _) = sign_up(&app, "Pam", "student").await;
    let globe = add_equipment(&app, &admin, "Globe", "Geography", 1).await;

    let (_, a) = request_equipment(&app, &first, globe).await;
    let (_, b) = request_equipment(&app, &second, globe).await;

    let (status, _) = send(&app, Method::PATCH, &format!("/api/request/{}/approve", a["id"]), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::PATCH, &format!("/api/request/{}/approve", b["id"]), Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Equipment unavailable");
    assert_eq!(available_count(&app, &admin, globe).await, 0);
}

#[tokio::test]
async fn test_listing_is_scoped_for_students() {
    let app = app();
    let (admin, _) = sign_up(&app, "Quinn", "admin").await;
    let (staff, _) = sign_up(&app, "Rae", "staff").await;
    let (alice, alice_id) = sign_up(&app, "Alice", "student").await;
    let (bob, bob_id) = sign_up(&app, "Bob", "student").await;
    let laptop = add_equipment(&app, &admin, "Laptop", "Computing", 4).await;

    request_equipment(&app, &alice, laptop).await;
    let (_, bobs) = request_equipment(&app, &bob, laptop).await;
    send(&app, Method::PATCH, &format!("/api/request/{}/approve", bobs["id"]), Some(&staff), None).await;

    let (status, mine) = send(&app, Method::GET, &format!("/api/request?user={}", bob_id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["user"]["id"], alice_id);

    let (_, all) = send(&app, Method::GET, "/api/request", Some(&staff), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, approved) = send(&app, Method::GET, "/api/request?status=approved", Some(&staff), None).await;
    let approved = approved.as_array().unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0]["user"]["id"], bob_id);

    let (_, bobs_only) = send(&app, Method::GET, &format!("/api/request?user={}", bob_id), Some(&admin), None).await;
    assert_eq!(bobs_only.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/api/request?status=lost", Some(&staff), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_blocked_by_active_requests_then_orphans_history() {
    let app = app();
    let (admin, _) = sign_up(&app, "Sam", "admin").await;
    let (student, _) = sign_up(&app, "Tia", "student").await;
    let projector = add_equipment(&app, &admin, "Projector", "Media", 2).await;

    let (_, created) = request_equipment(&app, &student, projector).await;
    let id = created["id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::DELETE, &format!("/api/equipment/{}", projector), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(&app, Method::PATCH, &format!("/api/request/{}/reject", id), Some(&admin), None).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/equipment/{}", projector), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send(&app, Method::GET, "/api/request", Some(&student), None).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "rejected");
    assert!(history[0]["equipment"].is_null());
}

#[tokio::test]
async fn test_shrinking_below_loaned_units_is_refused() {
    let app = app();
    let (admin, _) = sign_up(&app, "Uma", "admin").await;
    let (student, _) = sign_up(&app, "Vic", "student").await;
    let easel = add_equipment(&app, &admin, "Easel", "Art", 2).await;

    let (_, created) = request_equipment(&app, &student, easel).await;
    send(&app, Method::PATCH, &format!("/api/request/{}/approve", created["id"]), Some(&admin), None).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/equipment/{}", easel),
        Some(&admin),
        Some(json!({ "totalQuantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/equipment/{}", easel),
        Some(&admin),
        Some(json!({ "totalQuantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availableCount"], 0);

    let (status, _) = send(&app, Method::PATCH, &format!("/api/request/{}/return", created["id"]), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available_count(&app, &admin, easel).await, 1);
}

#[tokio::test]
async fn test_role_is_checked_before_the_body() {
    let app = app();
    let (admin, _) = sign_up(&app, "Wes", "admin").await;
    let (student, _) = sign_up(&app, "Xia", "student").await;
    let (staff, _) = sign_up(&app, "Yan", "staff").await;
    let drum = add_equipment(&app, &admin, "Drum", "Music", 1).await;

    let (status, body) = send(&app, Method::POST, "/api/equipment", Some(&student), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden - insufficient role");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/equipment/{}", drum),
        Some(&student),
        Some(json!({ "availableCount": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden - insufficient role");

    let (status, _) = send(&app, Method::DELETE, "/api/equipment/not-a-number", Some(&staff), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::POST, "/api/request", Some(&staff), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::PATCH, "/api/request/abc/approve", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_blank_names_are_rejected() {
    let app = app();
    let (admin, _) = sign_up(&app, "Zed", "admin").await;
    let violin = add_equipment(&app, &admin, "Violin", "Music", 1).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/equipment/{}", violin),
        Some(&admin),
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, &format!("/api/equipment/{}", violin), Some(&admin), None).await;
    assert_eq!(body["name"], "Violin");

    let (status, _) = register(&app, "   ", "blank@school.test", "student").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registration_defaults_to_student() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Noel", "email": "noel@school.test", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "noel@school.test", "password": "secret1" })),
    )
    .await;
    assert_eq!(body["user"]["role"], "student");
}
