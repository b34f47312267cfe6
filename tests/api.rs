// tests/api.rs
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use habits_api::store::MemoryStore;
use habits_api::{app, AppState};

fn router() -> Router {
    app(AppState::new(MemoryStore::new()), "")
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
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
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

#[tokio::test]
async fn todo_lifecycle_end_to_end() {
    let app = router();

    let (status, body) = send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "amy");

    let (status, body) = send(&app, Method::GET, "/todos?username=amy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, todo) = send(
        &app,
        Method::POST,
        "/todos",
        Some(json!({ "username": "amy", "todo": { "title": "x" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(todo["status"], "incomplete");
    assert_eq!(todo["username"], "amy");
    assert!(todo["completed_date"].is_null());

    let (status, done) = send(
        &app,
        Method::PATCH,
        "/todos",
        Some(json!({ "_id": todo["_id"], "status": "complete" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "complete");
    assert!(done["completed_date"].is_i64());
    assert_eq!(done["title"], "x");
    assert_eq!(done["version"], 1);

    let (status, _) = send(&app, Method::DELETE, "/todos", Some(json!({ "id": todo["_id"] }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, "/todos", Some(json!({ "id": todo["_id"] }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn unknown_user_is_404_everywhere() {
    let app = router();

    for uri in ["/users?username=ghost", "/habits?username=ghost", "/todos?username=ghost"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, json!({ "message": "User not found" }));
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/todos",
        Some(json!({ "username": "ghost", "todo": { "title": "x" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_info_and_login() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({ "username": "bob", "password": "pw" }))).await;
    send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;

    let (status, info) = send(&app, Method::GET, "/users?username=bob", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["password_protected"], true);
    assert!(info.get("password_hash").is_none());

    let (_, info) = send(&app, Method::GET, "/users?username=amy", None).await;
    assert_eq!(info["password_protected"], false);

    let login = |username: &str, password: &str| json!({ "username": username, "password": password });
    let (status, _) = send(&app, Method::POST, "/login", Some(login("bob", "pw"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::POST, "/login", Some(login("bob", "nope"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::POST, "/login", Some(login("amy", "anything"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::POST, "/login", Some(login("ghost", "pw"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/users", Some(json!({ "username": "bob" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn habit_endpoints() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;

    let (status, habit) = send(
        &app,
        Method::POST,
        "/habits",
        Some(json!({ "username": "amy", "title": "floss" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(habit["doneDates"], json!([]));
    assert_eq!(habit["owner_username"], "amy");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/habits",
        Some(json!({ "id": habit["_id"], "dates": ["2024/02/30"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/habits",
        Some(json!({ "id": habit["_id"], "dates": "2024/02/01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, updated) = send(
        &app,
        Method::PATCH,
        "/habits",
        Some(json!({ "id": habit["_id"], "dates": ["2024/02/01"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["doneDates"], json!(["2024/02/01"]));
    assert_eq!(updated["version"], 1);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/habits",
        Some(json!({ "id": Uuid::new_v4(), "dates": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/habits?id={}", habit["_id"].as_str().unwrap());
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_habits_reconciles_the_whole_set() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;

    let (_, one) = send(&app, Method::POST, "/habits", Some(json!({ "username": "amy", "title": "one" }))).await;
    let (_, two) = send(&app, Method::POST, "/habits", Some(json!({ "username": "amy", "title": "two" }))).await;
    let three = Uuid::new_v4();

    let submitted = json!({
        "username": "amy",
        "habits": [
            { "_id": one["_id"], "title": "one", "doneDates": ["2024/01/01"], "created_date": 0 },
            { "_id": three, "title": "three", "doneDates": [] },
        ]
    });

    let (status, body) = send(&app, Method::PUT, "/habits", Some(submitted.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], json!({ "deleted": 1, "updated": 1, "created": 1 }));
    let ids: Vec<&str> = body["habits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["_id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&one["_id"].as_str().unwrap()));
    assert!(!ids.contains(&two["_id"].as_str().unwrap()));
    assert_eq!(ids.len(), 2);

    let (_, again) = send(&app, Method::PUT, "/habits", Some(submitted)).await;
    assert_eq!(again["changes"], json!({ "deleted": 0, "updated": 0, "created": 0 }));

    let (status, _) = send(
        &app,
        Method::PUT,
        "/habits",
        Some(json!({ "username": "ghost", "habits": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_habits_without_done_dates_keeps_history() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;
    let (_, habit) = send(&app, Method::POST, "/habits", Some(json!({ "username": "amy", "title": "floss" }))).await;
    send(
        &app,
        Method::PATCH,
        "/habits",
        Some(json!({ "id": habit["_id"], "dates": ["2024/02/01"] })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/habits",
        Some(json!({ "username": "amy", "habits": [{ "_id": habit["_id"], "title": "floss" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], json!({ "deleted": 0, "updated": 0, "created": 0 }));
    assert_eq!(body["habits"][0]["doneDates"], json!(["2024/02/01"]));
}

#[tokio::test]
async fn todo_queries_and_summary() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;

    for (title, category, due) in [
        ("chocolate", None, None),
        ("mop floor", Some("chores"), Some(200)),
        ("taxes", Some("admin"), Some(100)),
    ] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/todos",
            Some(json!({ "username": "amy", "todo": { "title": title, "category": category, "due": due } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, sorted) = send(&app, Method::GET, "/todos?username=amy&sort=due", None).await;
    let titles: Vec<&str> = sorted.as_array().unwrap().iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["taxes", "mop floor", "chocolate"]);

    let (_, hits) = send(&app, Method::GET, "/todos?username=amy&q=CHO", None).await;
    assert_eq!(hits.as_array().unwrap().len(), 2);

    let (_, hits) = send(&app, Method::GET, "/todos?username=amy&category=Admin", None).await;
    assert_eq!(hits[0]["title"], "taxes");

    let (status, _) = send(&app, Method::GET, "/todos?username=amy&sort=sideways", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, counts) = send(&app, Method::GET, "/todos/summary?username=amy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        counts,
        json!({ "incomplete": 3, "complete": 0, "archived": 0, "snoozed": 0, "total": 3 })
    );
}

#[tokio::test]
async fn patch_rejects_bad_transitions_and_stale_versions() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({ "username": "amy" }))).await;
    let (_, todo) = send(
        &app,
        Method::POST,
        "/todos",
        Some(json!({ "username": "amy", "todo": { "title": "x" } })),
    )
    .await;

    let (status, archived) = send(
        &app,
        Method::PATCH,
        "/todos",
        Some(json!({ "_id": todo["_id"], "status": "archived", "version": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["version"], 1);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/todos",
        Some(json!({ "_id": todo["_id"], "status": "complete" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/todos",
        Some(json!({ "_id": todo["_id"], "title": "y", "version": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/todos",
        Some(json!({ "_id": Uuid::new_v4(), "title": "y" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn routes_mount_under_base_path() {
    let app = app(AppState::new(MemoryStore::new()), "/api");

    let (status, _) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, "/api/users", Some(json!({ "username": "amy" }))).await;
    assert_eq!(status, StatusCode::CREATED);
}
