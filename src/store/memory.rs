// src/store/memory.rs
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::habits::HabitChanges;
use crate::models::{Habit, Millis, Task, User};
use crate::AppError;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    habits: Vec<Habit>,
    tasks: Vec<Task>,
}

/// 进程内存储：`STORE=memory` 以及测试使用。
/// Vec 保持插入顺序，与 Postgres 实现按创建时间排序的结果一致。
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "User {} already exists",
                user.username
            )));
        }
        tables.users.push(user.clone());
        Ok(user.clone())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_habits(&self, owner: &str) -> Result<Vec<Habit>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .habits
            .iter()
            .filter(|h| h.owner == owner)
            .cloned()
            .collect())
    }

    async fn insert_habit(&self, habit: &Habit) -> Result<Habit, AppError> {
        let mut tables = self.tables.write().await;
        if tables.habits.iter().any(|h| h.id == habit.id) {
            return Err(AppError::Conflict(format!(
                "Habit id {} is already taken",
                habit.id
            )));
        }
        tables.habits.push(habit.clone());
        Ok(habit.clone())
    }

    async fn set_habit_dates(
        &self,
        id: Uuid,
        dates: &[String],
        now: Millis,
    ) -> Result<Option<Habit>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(habit) = tables.habits.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        habit.done_dates = dates.to_vec();
        habit.updated_date = now;
        habit.version += 1;
        Ok(Some(habit.clone()))
    }

    async fn delete_habit(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.habits.len();
        tables.habits.retain(|h| h.id != id);
        Ok(tables.habits.len() < before)
    }

    async fn apply_habit_changes(
        &self,
        owner: &str,
        changes: &HabitChanges,
    ) -> Result<Vec<Habit>, AppError> {
        // 整个同步持有同一把写锁；先检查冲突，确认无误后再修改
        let mut tables = self.tables.write().await;

        if let Some(taken) = changes
            .create
            .iter()
            .find(|new| tables.habits.iter().any(|h| h.id == new.id))
        {
            return Err(AppError::Conflict(format!(
                "Habit id {} is already taken",
                taken.id
            )));
        }

        tables
            .habits
            .retain(|h| !(h.owner == owner && changes.delete.contains(&h.id)));

        for update in &changes.update {
            if let Some(habit) = tables
                .habits
                .iter_mut()
                .find(|h| h.id == update.id && h.owner == owner)
            {
                habit.done_dates = update.done_dates.clone();
                habit.updated_date = changes.now;
                habit.version += 1;
            }
        }

        tables.habits.extend(changes.create.iter().cloned());

        Ok(tables
            .habits
            .iter()
            .filter(|h| h.owner == owner)
            .cloned()
            .collect())
    }

    async fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, AppError> {
        let mut tables = self.tables.write().await;
        if tables.tasks.iter().any(|t| t.id == task.id) {
            return Err(AppError::Conflict(format!(
                "Todo id {} is already taken",
                task.id
            )));
        }
        tables.tasks.push(task.clone());
        Ok(task.clone())
    }

    async fn update_task(
        &self,
        task: &Task,
        expected_version: i64,
    ) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables.write().await;
        match tables
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id && t.version == expected_version)
        {
            Some(stored) => {
                *stored = task.clone();
                Ok(Some(task.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        Ok(tables.tasks.len() < before)
    }
}
