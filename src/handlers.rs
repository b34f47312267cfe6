// src/handlers.rs
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::habits;
use crate::models::{
    CreateHabitSchema, CreateTodoSchema, CreateUserSchema, DeleteTodoSchema, Habit, HabitIdQuery,
    LoginSchema, PatchTodoSchema, ReconcileHabitsSchema, ReconcileResponse, Task, TodoQuery,
    UpdateHabitDatesSchema, UserInfo, UsernameQuery,
};
use crate::query::{StatusCounts, TaskView};
use crate::todos;
use crate::users;
use crate::validation::{ApiJson, ApiQuery, ValidatedJson};
use crate::AppError;
use crate::AppState;

// --- 0. 健康检查 ---
pub async fn health_handler() -> Json<Value> {
    Json(json!("I'm up"))
}

// --- 1. 用户注册 (POST /users) ---
pub async fn create_user_handler(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserSchema>,
) -> Result<(StatusCode, Json<String>), AppError> {
    let user = users::create_user(
        state.store.as_ref(),
        &payload.username,
        payload.password.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user.username)))
}

// --- 2. 用户信息 (GET /users?username=) ---
pub async fn get_user_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UsernameQuery>,
) -> Result<Json<UserInfo>, AppError> {
    let user = users::get_user(state.store.as_ref(), &query.username).await?;
    Ok(Json(UserInfo::from(user)))
}

// --- 3. 用户登录 (POST /login) ---
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginSchema>,
) -> Result<Json<Value>, AppError> {
    // 1. 用户不存在 -> 404
    users::get_user(state.store.as_ref(), &payload.username).await?;

    // 2. 验证密码；未设置密码的账户永远无法通过登录
    let password = payload.password.unwrap_or_default();
    if !users::verify_credentials(state.store.as_ref(), &payload.username, &password).await? {
        tracing::info!(username = %payload.username, "user login failed");
        return Err(AppError::Unauthorized("incorrect password".into()));
    }

    tracing::info!(username = %payload.username, "user login success");
    Ok(Json(json!({ "message": "login successful" })))
}

// --- 4. 获取习惯列表 (GET /habits?username=) ---
pub async fn get_habits_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UsernameQuery>,
) -> Result<Json<Vec<Habit>>, AppError> {
    let habits = habits::list_habits(state.store.as_ref(), &query.username).await?;
    Ok(Json(habits))
}

// --- 5. 创建习惯 (POST /habits) ---
pub async fn create_habit_handler(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateHabitSchema>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let habit = habits::create_habit(state.store.as_ref(), &body.username, &body.title).await?;
    Ok((StatusCode::CREATED, Json(habit)))
}

// --- 6. 更新打卡日期 (PATCH /habits) ---
pub async fn update_habit_dates_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UpdateHabitDatesSchema>,
) -> Result<Json<Habit>, AppError> {
    let habit = habits::set_done_dates(state.store.as_ref(), body.id, &body.dates).await?;
    Ok(Json(habit))
}

// --- 7. 整组同步 (PUT /habits) ---
pub async fn reconcile_habits_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ReconcileHabitsSchema>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let result = habits::reconcile(state.store.as_ref(), &body.username, body.habits).await?;
    Ok(Json(result))
}

// --- 8. 删除习惯 (DELETE /habits?id=) ---
pub async fn delete_habit_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HabitIdQuery>,
) -> Result<Json<String>, AppError> {
    if !habits::delete_habit(state.store.as_ref(), query.id).await? {
        return Err(AppError::NotFound(format!(
            "Habit with ID {} was not found",
            query.id
        )));
    }
    Ok(Json(format!("Habit {} was deleted", query.id)))
}

// --- 9. 获取任务列表 (GET /todos?username=&q=&category=&status=&sort=&order=) ---
pub async fn get_todos_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TodoQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let view = TaskView {
        text: query.q,
        category: query.category,
        status: query.status,
        sort: query.sort,
        order: query.order,
    };
    let tasks = todos::view_tasks(state.store.as_ref(), &query.username, &view).await?;
    Ok(Json(tasks))
}

// --- 10. 任务统计 (GET /todos/summary?username=) ---
pub async fn todo_summary_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UsernameQuery>,
) -> Result<Json<StatusCounts>, AppError> {
    let counts = todos::summarize(state.store.as_ref(), &query.username).await?;
    Ok(Json(counts))
}

// --- 11. 创建任务 (POST /todos) ---
pub async fn create_todo_handler(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateTodoSchema>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task = todos::create_task(state.store.as_ref(), &body.username, body.todo).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

// --- 12. 更新任务 (PATCH /todos) ---
pub async fn update_todo_handler(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PatchTodoSchema>,
) -> Result<Json<Task>, AppError> {
    let task = todos::patch_task(state.store.as_ref(), &body).await?;
    Ok(Json(task))
}

// --- 13. 删除任务 (DELETE /todos) ---
pub async fn delete_todo_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteTodoSchema>,
) -> Result<Json<String>, AppError> {
    if !todos::delete_task(state.store.as_ref(), body.id).await? {
        return Err(AppError::NotFound(format!(
            "Todo with ID {} was not found",
            body.id
        )));
    }
    Ok(Json(format!("Todo {} was deleted", body.id)))
}
