// src/todos.rs
//! 任务生命周期：状态转换表、稀疏 PATCH 合并、推迟到期处理。
use chrono::{DateTime, Local, TimeZone};
use uuid::Uuid;

use crate::models::{now_millis, Millis, NewTodo, PatchTodoSchema, Task, TaskStatus};
use crate::query::{count_by_status, StatusCounts, TaskView};
use crate::store::Store;
use crate::users::get_user;
use crate::AppError;

// --- 1. 状态机 ---

/// 用户可以触发的状态动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Complete,
    Uncomplete,
    /// incomplete -> snoozed，或 snoozed -> incomplete
    ToggleSnooze,
    Archive,
    Unarchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move a task from {from} to {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl TaskAction {
    /// 转换表；`None` 表示该状态下不允许此动作
    pub fn target(self, from: TaskStatus) -> Option<TaskStatus> {
        use TaskStatus::*;
        match (self, from) {
            (TaskAction::Complete, Incomplete | Snoozed) => Some(Complete),
            (TaskAction::Uncomplete, Complete) => Some(Incomplete),
            (TaskAction::ToggleSnooze, Incomplete) => Some(Snoozed),
            (TaskAction::ToggleSnooze, Snoozed) => Some(Incomplete),
            (TaskAction::Archive, _) => Some(Archived),
            (TaskAction::Unarchive, Archived) => Some(Incomplete),
            _ => None,
        }
    }

    /// 找到把 `from` 变成 `to` 的动作；状态不变时返回 `Ok(None)`
    pub fn between(from: TaskStatus, to: TaskStatus) -> Result<Option<Self>, InvalidTransition> {
        use TaskStatus::*;
        if from == to {
            return Ok(None);
        }
        let action = match (from, to) {
            (_, Archived) => TaskAction::Archive,
            (_, Complete) => TaskAction::Complete,
            (_, Snoozed) => TaskAction::ToggleSnooze,
            (Complete, Incomplete) => TaskAction::Uncomplete,
            (Snoozed, Incomplete) => TaskAction::ToggleSnooze,
            (Archived, Incomplete) => TaskAction::Unarchive,
            (Incomplete, Incomplete) => return Ok(None),
        };
        match action.target(from) {
            Some(reached) if reached == to => Ok(Some(action)),
            _ => Err(InvalidTransition { from, to }),
        }
    }
}

/// 复选框式切换：请求的状态等于当前状态时，改为切换到 `alternate`
pub fn toggle_target(
    current: TaskStatus,
    requested: TaskStatus,
    alternate: Option<TaskStatus>,
) -> TaskStatus {
    match alternate {
        Some(alternate) if requested == current => alternate,
        _ => requested,
    }
}

/// 执行动作及其日期副作用，并递增 version
pub fn apply_action(task: &mut Task, action: TaskAction, now: Millis) -> Result<(), AppError> {
    let to = action.target(task.status).ok_or(InvalidTransition {
        from: task.status,
        to: match action {
            TaskAction::Complete => TaskStatus::Complete,
            TaskAction::Archive => TaskStatus::Archived,
            TaskAction::ToggleSnooze => TaskStatus::Snoozed,
            TaskAction::Uncomplete | TaskAction::Unarchive => TaskStatus::Incomplete,
        },
    })?;

    match (action, to) {
        (TaskAction::Complete, _) => {
            task.completed_date = Some(now);
            task.snooze_date = None;
        }
        (TaskAction::Uncomplete, _) => task.completed_date = None,
        (TaskAction::ToggleSnooze, TaskStatus::Snoozed) => task.snooze_date = Some(now),
        (TaskAction::ToggleSnooze, _) => task.snooze_date = None,
        // 归档的任务不能再被推迟到期处理改回 incomplete
        (TaskAction::Archive, _) | (TaskAction::Unarchive, _) => task.snooze_date = None,
    }

    task.status = to;
    touch(task, now);
    Ok(())
}

fn touch(task: &mut Task, now: Millis) {
    task.updated_date = now;
    task.version += 1;
}

// --- 2. 推迟到期 ---

/// 本地时区当天零点的毫秒时间戳
pub fn start_of_local_day(now: DateTime<Local>) -> Millis {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map_or_else(|| now.timestamp_millis(), |dt| dt.timestamp_millis())
}

/// 推迟日期早于今天零点的任务恢复为 incomplete；返回是否有改动
pub fn expire_snooze(task: &mut Task, day_start: Millis, now: Millis) -> bool {
    match task.snooze_date {
        Some(snoozed_at) if snoozed_at < day_start => {
            task.snooze_date = None;
            task.status = TaskStatus::Incomplete;
            touch(task, now);
            true
        }
        _ => false,
    }
}

// --- 3. 构建与合并 ---

/// 新任务默认 incomplete；状态对应的日期字段由服务端生成
pub fn build_task(owner: &str, todo: NewTodo, now: Millis) -> Task {
    let status = todo.status.unwrap_or_default();
    Task {
        id: Uuid::new_v4(),
        owner: owner.to_owned(),
        title: todo.title,
        status,
        description: todo.description,
        category: todo.category,
        due_date: todo.due_date,
        completed_date: (status == TaskStatus::Complete).then_some(now),
        snooze_date: (status == TaskStatus::Snoozed).then(|| todo.snooze_date.unwrap_or(now)),
        order: todo.order,
        created_date: now,
        updated_date: now,
        version: 0,
    }
}

/// 只应用请求中出现的字段；状态变化走转换表。
/// 一次 PATCH 算一次修改，version 只加 1。
pub fn apply_patch(task: &mut Task, patch: &PatchTodoSchema, now: Millis) -> Result<(), AppError> {
    if let Some(expected) = patch.version {
        if expected != task.version {
            return Err(AppError::Conflict(format!(
                "Todo {} has version {}, not {}",
                task.id, task.version, expected
            )));
        }
    }
    let base_version = task.version;

    if let Some(requested) = patch.status {
        let target = toggle_target(task.status, requested, patch.alternate_status);
        if let Some(action) = TaskAction::between(task.status, target)? {
            apply_action(task, action, now)?;
        }
    }

    if let Some(snooze) = patch.snooze_date {
        match (task.status, snooze) {
            (TaskStatus::Snoozed, Some(at)) => task.snooze_date = Some(at),
            (_, None) if task.status != TaskStatus::Snoozed => task.snooze_date = None,
            _ => {
                return Err(AppError::BadRequest(
                    "snooze_date must be set exactly when the todo is snoozed".to_string(),
                ))
            }
        }
    }

    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(description) = &patch.description {
        task.description = description.clone();
    }
    if let Some(category) = &patch.category {
        task.category = category.clone();
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    if let Some(order) = patch.order {
        task.order = order;
    }

    task.updated_date = now;
    task.version = base_version + 1;
    Ok(())
}

// --- 4. 存储层之上的操作 ---

pub async fn create_task(store: &dyn Store, owner: &str, todo: NewTodo) -> Result<Task, AppError> {
    get_user(store, owner).await?;
    let task = store.insert_task(&build_task(owner, todo, now_millis())).await?;
    tracing::debug!(owner, todo_id = %task.id, "todo created");
    Ok(task)
}

/// 读取用户的全部任务；返回前先同步执行推迟到期处理并落库
pub async fn list_tasks(store: &dyn Store, owner: &str) -> Result<Vec<Task>, AppError> {
    get_user(store, owner).await?;
    let mut tasks = store.list_tasks(owner).await?;
    sweep_expired_snoozes(store, &mut tasks, Local::now()).await?;
    Ok(tasks)
}

/// 处理 `tasks` 中所有已到期的推迟；期间被并发删除的任务会从 `tasks` 中移除
pub async fn sweep_expired_snoozes(
    store: &dyn Store,
    tasks: &mut Vec<Task>,
    now: DateTime<Local>,
) -> Result<usize, AppError> {
    let day_start = start_of_local_day(now);
    let mut expired = 0;
    let mut deleted = Vec::new();

    for task in tasks.iter_mut() {
        let read_version = task.version;
        if !expire_snooze(task, day_start, now.timestamp_millis()) {
            continue;
        }
        expired += 1;
        if store.update_task(task, read_version).await?.is_none() {
            // 期间被其他请求修改或删除过：以存储中的最新值为准
            tracing::warn!(todo_id = %task.id, "todo changed during snooze sweep");
            match store.find_task(task.id).await? {
                Some(latest) => *task = latest,
                None => deleted.push(task.id),
            }
        }
    }
    tasks.retain(|t| !deleted.contains(&t.id));

    if expired > 0 {
        tracing::info!(expired, "snoozed todos returned to incomplete");
    }
    Ok(expired)
}

pub async fn view_tasks(
    store: &dyn Store,
    owner: &str,
    view: &TaskView,
) -> Result<Vec<Task>, AppError> {
    let tasks = list_tasks(store, owner).await?;
    Ok(view.apply(tasks))
}

pub async fn summarize(store: &dyn Store, owner: &str) -> Result<StatusCounts, AppError> {
    let tasks = list_tasks(store, owner).await?;
    Ok(count_by_status(&tasks))
}

pub async fn patch_task(store: &dyn Store, patch: &PatchTodoSchema) -> Result<Task, AppError> {
    let mut task = store
        .find_task(patch.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Todo not found".to_string()))?;
    let read_version = task.version;

    apply_patch(&mut task, patch, now_millis())?;

    match store.update_task(&task, read_version).await? {
        Some(saved) => Ok(saved),
        None if store.find_task(patch.id).await?.is_some() => Err(AppError::Conflict(
            "Todo was modified concurrently, reload and retry".to_string(),
        )),
        None => Err(AppError::NotFound("Todo not found".to_string())),
    }
}

pub async fn delete_task(store: &dyn Store, id: Uuid) -> Result<bool, AppError> {
    store.delete_task(id).await
}
