// src/lib.rs
use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod error;
pub mod habits;
pub mod handlers;
pub mod models;
pub mod query;
pub mod store;
pub mod todos;
pub mod users;
pub mod validation;

pub use error::AppError;

use handlers::*;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// 组装全部路由；`base_path` 为空时挂在根路径
pub fn app(state: AppState, base_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(health_handler))
        // 用户
        .route("/users", post(create_user_handler).get(get_user_handler))
        .route("/login", post(login_handler))
        // 习惯
        .route(
            "/habits",
            get(get_habits_handler)
                .post(create_habit_handler)
                .patch(update_habit_dates_handler)
                .put(reconcile_habits_handler)
                .delete(delete_habit_handler),
        )
        // 任务
        .route(
            "/todos",
            get(get_todos_handler)
                .post(create_todo_handler)
                .patch(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .route("/todos/summary", get(todo_summary_handler))
        .with_state(state);

    let router = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(base_path, api)
    };

    router.layer(TraceLayer::new_for_http()).layer(cors)
}
