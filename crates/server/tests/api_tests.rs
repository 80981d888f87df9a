//! Router-level tests: authentication, role gates and the graph endpoints,
//! driven through the full axum stack with a static identity provider.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use db::DBService;
use serde_json::{Value, json};
use server::{
    AppState,
    identity::{DirectoryUser, IdentityError, IdentityProvider, Viewer},
    routes,
};
use sqlx::SqlitePool;
use tower::ServiceExt;
use utils::clerk::ClerkAuthError;

const COACH: &str = "user_coach";
const MEMBER: &str = "user_member";
const OUTSIDER: &str = "user_outsider";
/// Token for which the provider cannot reach its signing keys.
const JWKS_DOWN: &str = "jwks_down";

/// Accepts any bearer token that looks like a user id and treats it as the
/// subject.
struct StaticIdentity {
    directory: Vec<DirectoryUser>,
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify(&self, bearer: &str) -> Result<Viewer, IdentityError> {
        if bearer.starts_with("user_") {
            Ok(Viewer {
                user_id: bearer.to_string(),
            })
        } else if bearer == JWKS_DOWN {
            Err(ClerkAuthError::JwksUrl(url::ParseError::EmptyHost).into())
        } else {
            Err(ClerkAuthError::MissingToken.into())
        }
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, IdentityError> {
        Ok(self.directory.clone())
    }
}

fn directory_user(id: &str) -> DirectoryUser {
    DirectoryUser {
        id: id.to_string(),
        display_name: id.to_string(),
        first_name: None,
        last_name: None,
        email: None,
        image_url: None,
    }
}

fn app(pool: SqlitePool) -> Router {
    let identity = StaticIdentity {
        directory: [COACH, MEMBER, OUTSIDER]
            .into_iter()
            .map(directory_user)
            .collect(),
    };
    let state = AppState::new(DBService::from_pool(pool), Arc::new(identity));
    routes::router(state, true)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {user}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_project(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/projects",
        Some(COACH),
        Some(json!({ "name": "P1", "description": "Launch plan" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn add_member(app: &Router, project_id: &str, user_id: &str, role: &str) -> StatusCode {
    let (status, _) = send(
        app,
        Method::POST,
        &format!("/api/projects/{project_id}/members"),
        Some(COACH),
        Some(json!({ "userId": user_id, "role": role })),
    )
    .await;
    status
}

async fn create_task(app: &Router, project_id: &str, label: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/projects/{project_id}/tasks"),
        Some(COACH),
        Some(json!({
            "type": "task",
            "position": { "x": 0.0, "y": 0.0 },
            "data": { "label": label }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[sqlx::test(migrations = "../db/migrations")]
async fn health_is_public(pool: SqlitePool) {
    let app = app(pool);
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_or_invalid_token_is_unauthorized(pool: SqlitePool) {
    let app = app(pool);

    let (status, body) = send(&app, Method::GET, "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&app, Method::GET, "/api/projects", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unreachable_signing_keys_are_a_server_error(pool: SqlitePool) {
    let app = app(pool);

    let (status, body) = send(&app, Method::GET, "/api/projects", Some(JWKS_DOWN), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Internal server error"));
}

// ============================================================================
// USERS
// ============================================================================

#[sqlx::test(migrations = "../db/migrations")]
async fn sync_then_fetch_current_user(pool: SqlitePool) {
    let app = app(pool);

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some(COACH), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/me/sync",
        Some(COACH),
        Some(json!({ "firstName": "Ada", "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tokenIdentifier"], json!(COACH));

    let (status, body) = send(&app, Method::GET, "/api/users/me", Some(COACH), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["firstName"], json!("Ada"));

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/users?tokenIdentifiers={COACH},unknown"),
        Some(MEMBER),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

// ============================================================================
// ROLE GATES
// ============================================================================

#[sqlx::test(migrations = "../db/migrations")]
async fn creator_is_coach_and_sees_project(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;

    let (status, body) = send(&app, Method::GET, "/api/projects", Some(COACH), None).await;
    assert_eq!(status, StatusCode::OK);
    let projects = body["data"].as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["id"], json!(project_id));
    assert_eq!(projects[0]["role"], json!("coach"));
    assert_eq!(projects[0]["graphVersion"], json!(0));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn outsider_is_forbidden_and_missing_project_is_not_found(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/projects/{project_id}/graph"),
        Some(OUTSIDER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/projects/{project_id}/tasks"),
        Some(OUTSIDER),
        Some(json!({ "data": { "label": "Sneaky" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/projects/00000000-0000-0000-0000-000000000000/graph",
        Some(COACH),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn access_endpoint_never_rejects(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;
    assert_eq!(
        add_member(&app, &project_id, MEMBER, "member").await,
        StatusCode::CREATED
    );

    let uri = format!("/api/projects/{project_id}/access");
    let (status, body) = send(&app, Method::GET, &uri, Some(OUTSIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "role": null, "hasAccess": false, "isCoach": false })
    );

    let (_, body) = send(&app, Method::GET, &uri, Some(MEMBER), None).await;
    assert_eq!(
        body["data"],
        json!({ "role": "member", "hasAccess": true, "isCoach": false })
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn member_edits_graph_but_not_settings(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;
    assert_eq!(
        add_member(&app, &project_id, MEMBER, "default").await,
        StatusCode::CREATED
    );

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/projects/{project_id}/tasks"),
        Some(MEMBER),
        Some(json!({ "data": { "label": "Member task" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["type"], json!("task"));
    assert_eq!(body["data"]["data"]["status"], json!("todo"));
    assert_eq!(body["data"]["data"]["priority"], json!("medium"));

    let project_uri = format!("/api/projects/{project_id}");
    let (status, _) = send(
        &app,
        Method::PUT,
        &project_uri,
        Some(MEMBER),
        Some(json!({ "name": "Renamed", "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &project_uri, Some(MEMBER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/projects/{project_id}/members"),
        Some(MEMBER),
        Some(json!({ "userId": OUTSIDER, "role": "member" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, &project_uri, Some(MEMBER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("P1"));
    assert_eq!(body["data"]["role"], json!("member"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn coach_updates_and_deletes_project(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;
    let project_uri = format!("/api/projects/{project_id}");

    let (status, _) = send(
        &app,
        Method::PUT,
        &project_uri,
        Some(COACH),
        Some(json!({ "name": "   ", "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PUT,
        &project_uri,
        Some(COACH),
        Some(json!({ "name": " Renamed ", "description": "New" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Renamed"));

    let (status, _) = send(&app, Method::DELETE, &project_uri, Some(COACH), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, &project_uri, Some(COACH), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

#[sqlx::test(migrations = "../db/migrations")]
async fn membership_conflicts_and_last_coach(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;

    assert_eq!(
        add_member(&app, &project_id, MEMBER, "member").await,
        StatusCode::CREATED
    );
    assert_eq!(
        add_member(&app, &project_id, MEMBER, "coach").await,
        StatusCode::CONFLICT
    );

    let coach_uri = format!("/api/projects/{project_id}/members/{COACH}");
    let (status, _) = send(&app, Method::DELETE, &coach_uri, Some(COACH), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::PUT,
        &coach_uri,
        Some(COACH),
        Some(json!({ "role": "member" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/projects/{project_id}/members/{OUTSIDER}"),
        Some(COACH),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/projects/{project_id}/members?role=coach"),
        Some(MEMBER),
        None,
    )
    .await;
    let coaches = body["data"].as_array().unwrap();
    assert_eq!(coaches.len(), 1);
    assert_eq!(coaches[0]["userId"], json!(COACH));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn candidates_exclude_assigned_users(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;
    add_member(&app, &project_id, MEMBER, "member").await;

    let uri = format!("/api/projects/{project_id}/members/candidates");
    let (status, body) = send(&app, Method::GET, &uri, Some(COACH), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![OUTSIDER]);

    let (status, _) = send(&app, Method::GET, &uri, Some(MEMBER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/api/directory/users", Some(MEMBER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

// ============================================================================
// GRAPH
// ============================================================================

#[sqlx::test(migrations = "../db/migrations")]
async fn graph_replace_remaps_and_detects_stale_saves(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;
    let a = create_task(&app, &project_id, "A").await;
    let b = create_task(&app, &project_id, "B").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/projects/{project_id}/edges"),
        Some(COACH),
        Some(json!({ "source": a, "target": b })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let graph_uri = format!("/api/projects/{project_id}/graph");
    let (status, loaded) = send(&app, Method::GET, &graph_uri, Some(COACH), None).await;
    assert_eq!(status, StatusCode::OK);
    let loaded = &loaded["data"];
    assert_eq!(loaded["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(loaded["edges"][0]["source"], json!(a));
    let version = loaded["version"].as_i64().unwrap();
    assert_eq!(version, 3);

    let mut nodes = loaded["nodes"].as_array().unwrap().clone();
    nodes.push(json!({
        "id": "local-c",
        "type": "task",
        "position": { "x": 5.0, "y": 5.0 },
        "data": { "label": "C", "status": "todo", "priority": "medium" }
    }));
    let mut edges = loaded["edges"].as_array().unwrap().clone();
    edges.push(json!({ "id": "local-bc", "source": b, "target": "local-c" }));
    let snapshot = json!({ "expectedVersion": version, "nodes": nodes, "edges": edges });

    let (status, saved) = send(
        &app,
        Method::PUT,
        &graph_uri,
        Some(COACH),
        Some(snapshot.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let saved = &saved["data"];
    assert_eq!(saved["version"], json!(version + 1));
    assert_eq!(saved["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(saved["edges"].as_array().unwrap().len(), 2);
    assert!(
        saved["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .all(|node| node["id"] != json!(a) && node["id"] != json!("local-c"))
    );

    // Same snapshot again: its base version is now stale.
    let (status, body) = send(&app, Method::PUT, &graph_uri, Some(COACH), Some(snapshot)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(
        &app,
        Method::PUT,
        &graph_uri,
        Some(COACH),
        Some(json!({
            "nodes": [{ "id": "n1", "data": { "label": "Only" } }],
            "edges": [{ "id": "e1", "source": "n1", "target": "ghost" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, after) = send(&app, Method::GET, &graph_uri, Some(COACH), None).await;
    assert_eq!(after["data"], *saved);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn edge_mutations_and_pair_delete(pool: SqlitePool) {
    let app = app(pool);
    let project_id = create_project(&app).await;
    let a = create_task(&app, &project_id, "A").await;
    let b = create_task(&app, &project_id, "B").await;
    let edges_uri = format!("/api/projects/{project_id}/edges");

    let (_, body) = send(
        &app,
        Method::POST,
        &edges_uri,
        Some(COACH),
        Some(json!({ "source": a, "target": b })),
    )
    .await;
    let edge_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("{edges_uri}/{edge_id}/style"),
        Some(COACH),
        Some(json!({ "stroke": "#f00", "strokeWidth": 3.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["style"],
        json!({ "stroke": "#f00", "strokeWidth": 3.0 })
    );

    let (_, body) = send(
        &app,
        Method::PUT,
        &format!("{edges_uri}/{edge_id}/animated"),
        Some(COACH),
        Some(json!({ "animated": true })),
    )
    .await;
    assert_eq!(body["data"]["animated"], json!(true));

    send(
        &app,
        Method::POST,
        &edges_uri,
        Some(COACH),
        Some(json!({ "source": a, "target": b })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("{edges_uri}?source={a}&target={b}"),
        Some(COACH),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], json!(2));

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("{edges_uri}/{edge_id}"),
        Some(COACH),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn task_updates_are_scoped_to_project(pool: SqlitePool) {
    let app = app(pool);
    let first = create_project(&app).await;
    let second = create_project(&app).await;
    let task = create_task(&app, &first, "A").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/projects/{second}/tasks/{task}/position"),
        Some(COACH),
        Some(json!({ "position": { "x": 1.0, "y": 1.0 } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/projects/{first}/tasks/{task}/data"),
        Some(COACH),
        Some(json!({ "label": "Renamed", "status": "in_progress", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"]["label"], json!("Renamed"));
    assert_eq!(body["data"]["data"]["status"], json!("in_progress"));
}
