// src/models.rs
use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::query::{SortKey, SortOrder};

/// 所有时间字段均为 Unix 毫秒时间戳（与前端的数值格式一致）
pub type Millis = i64;

pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

// --- 1. User 模型 ---
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub username: String,
    pub created_date: Millis,
    pub updated_date: Millis,
    #[serde(skip)]
    pub password_hash: Option<String>,
}

/// GET /users 的返回体，不暴露哈希本身
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub created_date: Millis,
    pub updated_date: Millis,
    pub password_protected: bool,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            password_protected: user.password_hash.is_some(),
            username: user.username,
            created_date: user.created_date,
            updated_date: user.updated_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserSchema {
    #[validate(length(min = 1, max = 64, message = "username must be 1-64 characters"))]
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginSchema {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

// --- 2. Habit 模型 ---
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Habit {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "owner_username")]
    #[sqlx(rename = "owner_username")]
    pub owner: String,
    pub title: String,
    #[serde(rename = "doneDates")]
    pub done_dates: Vec<String>,
    pub frequency: Option<String>,
    pub status: Option<String>,
    pub created_date: Millis,
    pub updated_date: Millis,
    pub version: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHabitSchema {
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "title must not be empty"))]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHabitDatesSchema {
    pub id: Uuid,
    pub dates: Vec<String>,
}

/// PUT /habits 中客户端提交的单个习惯；审计字段一律忽略
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedHabit {
    #[serde(rename = "_id", default)]
    pub id: Option<Uuid>,
    pub title: Option<String>,
    /// 缺省表示不改动已有习惯的打卡日期
    #[serde(rename = "doneDates", default)]
    pub done_dates: Option<Vec<String>>,
    pub frequency: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileHabitsSchema {
    pub username: String,
    pub habits: Vec<SubmittedHabit>,
}

#[derive(Debug, Deserialize)]
pub struct HabitIdQuery {
    pub id: Uuid,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub deleted: usize,
    pub updated: usize,
    pub created: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub changes: ChangeCounts,
    pub habits: Vec<Habit>,
}

// --- 3. Task (Todo) 模型 ---

/// 任务状态，持久化为小写字符串
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Incomplete,
    Complete,
    Archived,
    Snoozed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Incomplete,
        TaskStatus::Complete,
        TaskStatus::Archived,
        TaskStatus::Snoozed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Incomplete => "incomplete",
            TaskStatus::Complete => "complete",
            TaskStatus::Archived => "archived",
            TaskStatus::Snoozed => "snoozed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task status: '{0}' (must be one of: incomplete, complete, archived, snoozed)")]
pub struct InvalidStatus(pub String);

impl FromStr for TaskStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(TaskStatus::Incomplete),
            "complete" => Ok(TaskStatus::Complete),
            "archived" => Ok(TaskStatus::Archived),
            "snoozed" => Ok(TaskStatus::Snoozed),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = InvalidStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "username")]
    #[sqlx(rename = "username")]
    pub owner: String,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<Millis>,
    pub completed_date: Option<Millis>,
    pub snooze_date: Option<Millis>,
    #[sqlx(rename = "sort_order")]
    pub order: Option<f64>,
    pub created_date: Millis,
    pub updated_date: Millis,
    pub version: i64,
}

/// POST /todos 中的 todo 字段；created/updated/completed 等审计字段由服务端生成
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct NewTodo {
    #[validate(length(min = 1, max = 255, message = "title must not be empty"))]
    pub title: String,
    pub status: Option<TaskStatus>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "due", alias = "dueDate")]
    pub due_date: Option<Millis>,
    pub snooze_date: Option<Millis>,
    pub order: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTodoSchema {
    pub username: String,
    #[validate(nested)]
    pub todo: NewTodo,
}

/// PATCH /todos：稀疏合并。
/// 外层 None = 字段缺省（不动）；Some(None) = 显式 null（清空）
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct PatchTodoSchema {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 255, message = "title must not be empty"))]
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    /// 请求状态与当前状态相同时的切换目标
    pub alternate_status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", alias = "due", alias = "dueDate")]
    pub due_date: Option<Option<Millis>>,
    #[serde(default, deserialize_with = "nullable")]
    pub snooze_date: Option<Option<Millis>>,
    #[serde(default, deserialize_with = "nullable")]
    pub order: Option<Option<f64>>,
    /// 乐观锁：提供时必须与当前版本一致
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTodoSchema {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TodoQuery {
    pub username: String,
    pub q: Option<String>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

// 字段出现即 Some(..)，值为 null 时是 Some(None)
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let id = Uuid::new_v4();
        let patch: PatchTodoSchema = serde_json::from_value(json!({
            "_id": id,
            "category": null,
            "dueDate": 1700000000000_i64,
        }))
        .unwrap();

        assert_eq!(patch.id, id);
        assert_eq!(patch.description, None);
        assert_eq!(patch.category, Some(None));
        assert_eq!(patch.due_date, Some(Some(1_700_000_000_000)));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn new_todo_accepts_client_due_alias() {
        let todo: NewTodo = serde_json::from_value(json!({ "title": "x", "due": 42 })).unwrap();
        assert_eq!(todo.due_date, Some(42));
        assert_eq!(todo.status, None);
    }

    #[test]
    fn status_parses_only_known_values() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert!("deleted".parse::<TaskStatus>().is_err());
        assert!("Complete".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn task_serializes_with_wire_field_names() {
        let task = Task {
            id: Uuid::nil(),
            owner: "amy".into(),
            title: "x".into(),
            status: TaskStatus::Snoozed,
            description: None,
            category: None,
            due_date: None,
            completed_date: None,
            snooze_date: Some(5),
            order: None,
            created_date: 1,
            updated_date: 2,
            version: 0,
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["_id"], json!(Uuid::nil()));
        assert_eq!(value["username"], "amy");
        assert_eq!(value["status"], "snoozed");
        assert_eq!(value["snooze_date"], 5);
        assert!(value["due_date"].is_null());
    }

    #[test]
    fn user_info_hides_hash() {
        let info = UserInfo::from(User {
            username: "amy".into(),
            created_date: 1,
            updated_date: 1,
            password_hash: Some("$argon2id$...".into()),
        });
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["password_protected"], true);
        assert!(value.get("password_hash").is_none());
    }
}
