use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use medivault_api::{build_router, AppState};
use medivault_core::{open_db_in_memory, AppConfig, UserService};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "correct-horse-9";
const FUTURE_MS: i64 = 4_102_444_800_000;

fn app() -> Router {
    let conn = open_db_in_memory().unwrap();
    UserService::from_connection(&conn)
        .unwrap()
        .bootstrap_admin(ADMIN_EMAIL, PASSWORD, "Site Admin")
        .unwrap();
    let config = AppConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
    build_router(AppState::new(conn, config))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn register(app: &Router, email: &str, role: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": PASSWORD,
            "full_name": format!("{role} account"),
            "role": role,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_uses_success_envelope() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pong");
}

#[tokio::test]
async fn register_login_me_logout() {
    let app = app();
    register(&app, "pat@example.com", "patient").await;
    let token = login(&app, "pat@example.com").await;

    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["user"]["role"], "patient");
    assert_eq!(me["data"]["user"]["email"], "pat@example.com");
    assert!(me["data"]["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("book_appointment")));

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn error_responses_use_the_failure_envelope() {
    let app = app();

    let (status, body) = send(&app, "GET", "/api/appointments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "x@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "boss@example.com",
            "password": PASSWORD,
            "full_name": "Boss",
            "role": "admin",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "invalid email or password");
}

#[tokio::test]
async fn unknown_routes_and_methods_use_the_failure_envelope() {
    let app = app();

    let (status, body) = send(&app, "GET", "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, "GET", "/elsewhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, "DELETE", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "method_not_allowed");
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let app = app();
    register(&app, "dup@example.com", "patient").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "DUP@example.com",
            "password": PASSWORD,
            "full_name": "Again",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn appointment_flow_over_http() {
    let app = app();
    let admin = login(&app, ADMIN_EMAIL).await;

    let (status, doctor) = send(
        &app,
        "POST",
        "/api/admin/users",
        Some(&admin),
        Some(json!({
            "email": "doc@example.com",
            "password": PASSWORD,
            "full_name": "Dr. Who",
            "role": "doctor",
            "specialization": "General practice",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let doctor_id = doctor["data"]["id"].as_str().unwrap().to_string();

    register(&app, "pat@example.com", "patient").await;
    register(&app, "rx@example.com", "pharmacist").await;
    let patient = login(&app, "pat@example.com").await;
    let doctor = login(&app, "doc@example.com").await;
    let pharmacist = login(&app, "rx@example.com").await;

    let (status, doctors) = send(&app, "GET", "/api/doctors", Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doctors["data"].as_array().unwrap().len(), 1);

    let (status, booked) = send(
        &app,
        "POST",
        "/api/appointments",
        Some(&patient),
        Some(json!({
            "doctor_id": doctor_id,
            "scheduled_at": FUTURE_MS,
            "reason": "headache",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{booked}");
    assert_eq!(booked["data"]["status"], "pending");
    let appointment_id = booked["data"]["id"].as_str().unwrap().to_string();

    let (status, unread) = send(
        &app,
        "GET",
        "/api/notifications/unread-count",
        Some(&doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unread["data"]["unread"], 1);

    let status_uri = format!("/api/appointments/{appointment_id}/status");
    let (status, confirmed) = send(
        &app,
        "PATCH",
        &status_uri,
        Some(&doctor),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["data"]["status"], "confirmed");

    let (status, body) = send(
        &app,
        "PATCH",
        &status_uri,
        Some(&doctor),
        Some(json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_transition");

    let (status, listed) = send(
        &app,
        "GET",
        "/api/appointments?status=confirmed&limit=500",
        Some(&patient),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"]["applied_limit"], 100);

    let (status, _) = send(&app, "GET", "/api/appointments", Some(&pharmacist), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, inbox) = send(&app, "GET", "/api/notifications", Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    let notification_id = inbox["data"]["items"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/notifications/{notification_id}/read"),
        Some(&doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/notifications/{notification_id}/read"),
        Some(&patient),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, summary) = send(
        &app,
        "GET",
        "/api/admin/reports/summary",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data"]["appointments_by_status"]["confirmed"], 1);
    assert_eq!(summary["data"]["active_users_by_role"]["pharmacist"], 1);

    let (status, _) = send(
        &app,
        "GET",
        "/api/admin/reports/summary",
        Some(&doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn prescription_and_lab_flow_over_http() {
    let app = app();
    let admin = login(&app, ADMIN_EMAIL).await;
    register(&app, "doc@example.com", "doctor").await;
    let patient_id = register(&app, "pat@example.com", "patient").await;
    register(&app, "rx@example.com", "pharmacist").await;
    register(&app, "lab@example.com", "lab_technician").await;
    let doctor = login(&app, "doc@example.com").await;
    let pharmacist = login(&app, "rx@example.com").await;
    let lab = login(&app, "lab@example.com").await;

    let (status, prescription) = send(
        &app,
        "POST",
        "/api/prescriptions",
        Some(&doctor),
        Some(json!({
            "patient_id": patient_id,
            "medication": "Ibuprofen",
            "dosage": "200 mg",
            "frequency": "as needed",
            "duration_days": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{prescription}");
    let prescription_id = prescription["data"]["id"].as_str().unwrap().to_string();

    let (status, dispensed) = send(
        &app,
        "PATCH",
        &format!("/api/prescriptions/{prescription_id}/dispense"),
        Some(&pharmacist),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dispensed["data"]["status"], "dispensed");

    let (status, test) = send(
        &app,
        "POST",
        "/api/lab-tests",
        Some(&doctor),
        Some(json!({ "patient_id": patient_id, "test_name": "Lipid panel" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = test["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/lab-tests/{test_id}/start"),
        Some(&lab),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, completed) = send(
        &app,
        "PATCH",
        &format!("/api/lab-tests/{test_id}/result"),
        Some(&lab),
        Some(json!({ "result": "LDL 100 mg/dL" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["data"]["status"], "completed");

    let (status, schema) = send(&app, "GET", "/api/admin/schema", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schema["data"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn malformed_path_and_query_are_bad_requests() {
    let app = app();
    let admin = login(&app, ADMIN_EMAIL).await;

    let (status, body) = send(&app, "GET", "/api/appointments/not-a-uuid", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(
        &app,
        "GET",
        "/api/appointments?status=teleported",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
