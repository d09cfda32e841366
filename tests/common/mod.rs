#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use casedesk::modules::users::UserService;
use casedesk::router::init_router;
use casedesk::state::AppState;
use casedesk_models::{CreateUserDto, PermissionId, RoleId, SYSTEM_ADMIN_ROLE_ID};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

/// Seeded role IDs (must match migration)
pub mod seeded_roles {
    use casedesk_models::RoleId;

    pub const SUPERVISOR: RoleId = RoleId::from_u128(2);
    pub const AGENTE: RoleId = RoleId::from_u128(3);
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
}

pub fn setup_test_app(pool: PgPool) -> Router {
    init_router(AppState::for_tests(pool), None)
}

pub fn generate_unique_email() -> String {
    format!("test-{}@casedesk.test", Uuid::new_v4())
}

pub fn generate_unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, Uuid::new_v4())
}

pub async fn create_test_user(pool: &PgPool, role_id: Option<RoleId>) -> TestUser {
    let email = generate_unique_email();
    let password = "testpass123".to_string();
    let user = UserService::create_user(
        pool,
        CreateUserDto {
            email: email.clone(),
            full_name: Some("Test User".into()),
            password: password.clone(),
            role_id,
        },
    )
    .await
    .unwrap();

    TestUser {
        id: user.id.into(),
        email,
        password,
    }
}

/// Resolves seeded permission names to their IDs.
pub async fn permission_ids(pool: &PgPool, names: &[&str]) -> Vec<PermissionId> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let ids: Vec<PermissionId> =
        sqlx::query_scalar("SELECT id FROM permissions WHERE name = ANY($1) ORDER BY name")
            .bind(&names)
            .fetch_all(pool)
            .await
            .unwrap();
    assert_eq!(ids.len(), names.len(), "unknown permission in {names:?}");
    ids
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub async fn login(app: &Router, user: &TestUser) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": user.password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

/// Token of a fresh user holding the system administrator role.
pub async fn admin_token(pool: &PgPool, app: &Router) -> String {
    let admin = create_test_user(pool, Some(SYSTEM_ADMIN_ROLE_ID)).await;
    login(app, &admin).await
}
