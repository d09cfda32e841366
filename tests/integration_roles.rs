mod common;

use std::collections::HashSet;

use axum::http::{Method, StatusCode};
use casedesk::modules::permissions::service::{get_role_permissions, has_permission};
use casedesk::modules::roles::service::{assign_permissions_to_role, create_role};
use casedesk_models::{CreateRoleDto, SYSTEM_ADMIN_ROLE_ID};
use common::{
    admin_token, create_test_user, generate_unique_name, login, permission_ids, seeded_roles,
    send, setup_test_app,
};
use serde_json::json;
use sqlx::PgPool;

async fn empty_role(pool: &PgPool) -> casedesk_models::RoleId {
    create_role(
        pool,
        CreateRoleDto {
            name: generate_unique_name("Rol"),
            description: None,
            permission_ids: None,
            is_active: None,
        },
    )
    .await
    .unwrap()
    .role
    .id
}

#[sqlx::test(migrations = "./migrations")]
async fn test_assign_then_read_returns_exactly_the_set(pool: PgPool) {
    let role_id = empty_role(&pool).await;
    let first = permission_ids(&pool, &["casos.read.own", "casos.update.own"]).await;
    assign_permissions_to_role(&pool, role_id, &first).await.unwrap();

    // Replacing drops the previous set entirely
    let second = permission_ids(
        &pool,
        &["knowledge.read.all", "casos.read.team", "dispositions.create.own"],
    )
    .await;
    let mut with_duplicate = second.clone();
    with_duplicate.push(second[0]);
    assign_permissions_to_role(&pool, role_id, &with_duplicate)
        .await
        .unwrap();

    let read: HashSet<_> = get_role_permissions(&pool, role_id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    let expected: HashSet<_> = second.into_iter().collect();
    assert_eq!(read, expected);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_has_permission_true_exactly_for_assigned(pool: PgPool) {
    let role_id = empty_role(&pool).await;
    let granted = ["casos.read.team", "knowledge.read.all"];
    let ids = permission_ids(&pool, &granted).await;
    assign_permissions_to_role(&pool, role_id, &ids).await.unwrap();

    let all: Vec<String> = sqlx::query_scalar("SELECT name FROM permissions")
        .fetch_all(&pool)
        .await
        .unwrap();
    for name in all {
        let expected = granted.contains(&name.as_str());
        assert_eq!(
            has_permission(&pool, role_id, &name).await.unwrap(),
            expected,
            "{name}"
        );
    }
    assert!(!has_permission(&pool, role_id, "casos.read.everything").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_inactive_permission_is_not_granted(pool: PgPool) {
    let role_id = empty_role(&pool).await;
    let ids = permission_ids(&pool, &["knowledge.update.own"]).await;
    assign_permissions_to_role(&pool, role_id, &ids).await.unwrap();

    sqlx::query("UPDATE permissions SET is_active = false WHERE id = $1")
        .bind(ids[0])
        .execute(&pool)
        .await
        .unwrap();

    assert!(!has_permission(&pool, role_id, "knowledge.update.own").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_assign_unknown_permission_is_rejected(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;
    let role_id = empty_role(&pool).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/roles/{}/permissions", role_id),
        Some(&token),
        Some(json!({ "permission_ids": [uuid::Uuid::new_v4()] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Permisos no encontrados"));
    assert!(get_role_permissions(&pool, role_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_role_with_users_is_soft(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;
    let role_id = empty_role(&pool).await;
    create_test_user(&pool, Some(role_id)).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/roles/{}/deletion-safety", role_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], "soft_delete");
    assert_eq!(body["data"]["user_count"], 1);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/roles/{}", role_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], "soft_delete");

    let is_active: bool = sqlx::query_scalar("SELECT is_active FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_active);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_unused_role_is_hard(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;
    let role_id = empty_role(&pool).await;
    let ids = permission_ids(&pool, &["casos.read.own"]).await;
    assign_permissions_to_role(&pool, role_id, &ids).await.unwrap();

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/roles/{}", role_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], "hard_delete");

    let remaining: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM roles WHERE id = $1) + (SELECT COUNT(*) FROM role_permissions WHERE role_id = $1)",
    )
    .bind(role_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(remaining, 0);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/roles/{}", role_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_system_role_cannot_be_deleted_or_deactivated(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/roles/{}", SYSTEM_ADMIN_ROLE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/roles/{}", SYSTEM_ADMIN_ROLE_ID),
        Some(&token),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "El rol de sistema no puede desactivarse");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_and_clone_role(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;
    let ids = permission_ids(&pool, &["casos.read.all", "knowledge.read.all"]).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/roles",
        Some(&token),
        Some(json!({ "name": generate_unique_name("Auditor"), "permission_ids": ids })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["permissions"].as_array().unwrap().len(), 2);
    let source_id = body["data"]["id"].as_str().unwrap().to_string();

    let clone_name = generate_unique_name("Auditor copia");
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/roles/{}/clone", source_id),
        Some(&token),
        Some(json!({ "name": clone_name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], clone_name);
    assert_ne!(body["data"]["id"], source_id);
    assert_eq!(body["data"]["permissions"].as_array().unwrap().len(), 2);

    // Same name again conflicts
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/roles/{}/clone", source_id),
        Some(&token),
        Some(json!({ "name": clone_name })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_blank_role_names_are_rejected(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/roles",
        Some(&token),
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let source = seeded_roles::SUPERVISOR.to_string();
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/roles/{}/clone", source),
        Some(&token),
        Some(json!({ "name": "\t" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/roles/{}", source),
        Some(&token),
        Some(json!({ "name": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let blank: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE btrim(name) = ''")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(blank, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_highest_scope_and_check(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!(
            "/api/roles/{}/highest-scope?module=casos&action=read",
            seeded_roles::SUPERVISOR
        ),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scope"], "team");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!(
            "/api/roles/{}/highest-scope?module=casos&action=delete",
            seeded_roles::AGENTE
        ),
        Some(&token),
        None,
    )
    .await;
    assert!(body["data"]["scope"].is_null());

    let (status, body) = send(
        &app,
        Method::GET,
        &format!(
            "/api/roles/{}/check?module=casos&action=read",
            seeded_roles::AGENTE
        ),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["permission"], "casos.read.own");
    assert_eq!(body["data"]["granted"], true);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/roles/{}/check", seeded_roles::AGENTE),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_roles_require_permission(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let agent = create_test_user(&pool, Some(seeded_roles::AGENTE)).await;
    let token = login(&app, &agent).await;

    let (status, _) = send(&app, Method::GET, "/api/roles", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/roles", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
