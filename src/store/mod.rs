// src/store/mod.rs
//! 持久化边界。业务逻辑只依赖 [`Store`]，
//! 生产环境用 Postgres，测试与本地开发可用内存实现。
use async_trait::async_trait;
use uuid::Uuid;

use crate::habits::HabitChanges;
use crate::models::{Habit, Millis, Task, User};
use crate::AppError;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // --- 用户 ---

    /// 用户名已存在时返回 `AppError::Conflict`
    async fn insert_user(&self, user: &User) -> Result<User, AppError>;
    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError>;

    // --- 习惯 ---

    /// 按创建顺序返回
    async fn list_habits(&self, owner: &str) -> Result<Vec<Habit>, AppError>;
    async fn insert_habit(&self, habit: &Habit) -> Result<Habit, AppError>;
    /// 整体替换打卡日期并递增 version；id 不存在时返回 `None`
    async fn set_habit_dates(
        &self,
        id: Uuid,
        dates: &[String],
        now: Millis,
    ) -> Result<Option<Habit>, AppError>;
    async fn delete_habit(&self, id: Uuid) -> Result<bool, AppError>;
    /// 原子地执行一次批量同步（删除、更新、新建），并返回同步后的完整列表
    async fn apply_habit_changes(
        &self,
        owner: &str,
        changes: &HabitChanges,
    ) -> Result<Vec<Habit>, AppError>;

    // --- 任务 ---

    /// 按创建顺序返回
    async fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, AppError>;
    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError>;
    async fn insert_task(&self, task: &Task) -> Result<Task, AppError>;
    /// 仅当存储中的版本仍为 `expected_version` 时写入整条记录，
    /// 记录不存在或版本已变化时返回 `None`
    async fn update_task(&self, task: &Task, expected_version: i64)
        -> Result<Option<Task>, AppError>;
    async fn delete_task(&self, id: Uuid) -> Result<bool, AppError>;
}
