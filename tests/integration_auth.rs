mod common;

use axum::http::{Method, StatusCode};
use casedesk::modules::users::UserService;
use casedesk_auth::verify_token;
use casedesk_models::UserId;
use common::{create_test_user, login, seeded_roles, send, setup_test_app};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_login_success_embeds_role_permissions(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let user = create_test_user(&pool, Some(seeded_roles::AGENTE)).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email.to_uppercase(), "password": user.password })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["token_type"], "Bearer");
    assert_eq!(data["user"]["email"], user.email);
    assert_eq!(data["user"]["role_name"], "Agente");
    assert!(data["user"].get("password").is_none());
    assert!(!data["user"]["last_login_at"].is_null());

    let permissions: Vec<&str> = data["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"casos.read.own"));
    assert!(permissions.contains(&"knowledge.read.all"));
    assert!(!permissions.contains(&"casos.delete.own"));

    let claims = verify_token(
        data["access_token"].as_str().unwrap(),
        &casedesk::state::AppState::for_tests(pool.clone()).jwt_config,
    )
    .unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.permissions.len(), permissions.len());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_without_role_has_no_permissions(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let user = create_test_user(&pool, None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": user.password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["permissions"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_invalid_credentials(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let user = create_test_user(&pool, Some(seeded_roles::AGENTE)).await;

    for payload in [
        json!({ "email": "nadie@casedesk.test", "password": "whatever1" }),
        json!({ "email": user.email, "password": "wrong-password" }),
    ] {
        let (status, body) =
            send(&app, Method::POST, "/api/auth/login", None, Some(payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Credenciales inválidas");
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_inactive_user(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let user = create_test_user(&pool, Some(seeded_roles::AGENTE)).await;
    UserService::set_active(&pool, UserId::from(user.id), false)
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": user.password })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Usuario inactivo");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_invalid_email_format(pool: PgPool) {
    let app = setup_test_app(pool);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "not-an-email", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_profile_requires_valid_token(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let user = create_test_user(&pool, Some(seeded_roles::SUPERVISOR)).await;
    let token = login(&app, &user).await;

    let (status, body) = send(&app, Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], user.email);

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
