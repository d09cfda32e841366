mod common;

use axum::http::{Method, StatusCode};
use casedesk::modules::permissions::service::{repair_permission_names, user_has_permission};
use casedesk_models::UserId;
use common::{admin_token, create_test_user, login, seeded_roles, send, setup_test_app};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_create_permission_builds_name(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/permissions",
        Some(&token),
        Some(json!({ "module": "Reportes", "action": "export", "scope": "team" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "reportes.export.team");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/permissions",
        Some(&token),
        Some(json!({ "module": "reportes", "action": "export", "scope": "team" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/permissions",
        Some(&token),
        Some(json!({ "module": "repo.rtes", "action": "export" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_permission_recomputes_name(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/permissions",
        Some(&token),
        Some(json!({ "module": "encuestas", "action": "read" })),
    )
    .await;
    assert_eq!(body["data"]["name"], "encuestas.read.own");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/permissions/{}", id),
        Some(&token),
        Some(json!({ "scope": "all" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "encuestas.read.all");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_and_group_permissions(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let token = admin_token(&pool, &app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/permissions?module=casos&limit=100",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["total"], 12);

    let (_, body) = send(&app, Method::GET, "/api/permissions/modules", Some(&token), None).await;
    let modules = body["data"].as_array().unwrap();
    assert!(modules.contains(&json!("casos")));
    assert!(modules.contains(&json!("parameters")));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/permissions/by-module?role_id={}", seeded_roles::AGENTE),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["data"].as_array().unwrap();
    let casos = groups.iter().find(|g| g["module"] == "casos").unwrap();
    assert_eq!(casos["permissions"].as_array().unwrap().len(), 3);
    assert!(groups.iter().all(|g| g["module"] != "roles"));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_user_has_permission_follows_role_and_activity(pool: PgPool) {
    let user = create_test_user(&pool, Some(seeded_roles::AGENTE)).await;
    let user_id = UserId::from(user.id);

    assert!(user_has_permission(&pool, user_id, "casos.read.own").await.unwrap());
    assert!(!user_has_permission(&pool, user_id, "casos.read.all").await.unwrap());

    sqlx::query("UPDATE roles SET is_active = false WHERE id = $1")
        .bind(seeded_roles::AGENTE)
        .execute(&pool)
        .await
        .unwrap();
    assert!(!user_has_permission(&pool, user_id, "casos.read.own").await.unwrap());

    let no_role = create_test_user(&pool, None).await;
    assert!(
        !user_has_permission(&pool, UserId::from(no_role.id), "casos.read.own")
            .await
            .unwrap()
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_repair_permission_names(pool: PgPool) {
    sqlx::query("UPDATE permissions SET name = 'casos_lectura_propia' WHERE name = 'casos.read.own'")
        .execute(&pool)
        .await
        .unwrap();

    let report = repair_permission_names(&pool).await.unwrap();
    assert_eq!(report.repaired.len(), 1);
    assert_eq!(report.repaired[0].old_name, "casos_lectura_propia");
    assert_eq!(report.repaired[0].new_name, "casos.read.own");
    assert!(report.conflicts.is_empty());

    let again = repair_permission_names(&pool).await.unwrap();
    assert!(again.repaired.is_empty());
    assert_eq!(again.checked, report.checked);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_repair_applies_renames_freed_later_in_the_pass(pool: PgPool) {
    // The own-scope row wants `zz.x.own`, which the all-scope row holds until
    // it is itself renamed to `zz.x.all`.
    sqlx::query(
        r#"INSERT INTO permissions (name, module, action, scope)
        VALUES ('zz.x.team', 'zz', 'x', 'own'), ('zz.x.own', 'zz', 'x', 'all')"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let report = repair_permission_names(&pool).await.unwrap();
    assert_eq!(report.repaired.len(), 2);
    assert!(report.conflicts.is_empty());

    let mut names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM permissions WHERE module = 'zz'")
            .fetch_all(&pool)
            .await
            .unwrap();
    names.sort();
    assert_eq!(names, vec!["zz.x.all", "zz.x.own"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_repair_reports_swapped_names_as_conflicts(pool: PgPool) {
    sqlx::query(
        r#"INSERT INTO permissions (name, module, action, scope)
        VALUES ('zz.y.team', 'zz', 'y', 'own'), ('zz.y.own', 'zz', 'y', 'team')"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let report = repair_permission_names(&pool).await.unwrap();
    assert!(report.repaired.is_empty());
    assert_eq!(report.conflicts.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_permission_catalog_requires_permission(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let agent = create_test_user(&pool, Some(seeded_roles::AGENTE)).await;
    let token = login(&app, &agent).await;

    let (status, _) = send(&app, Method::GET, "/api/permissions", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
