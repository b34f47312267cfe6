// src/store/postgres.rs
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::Store;
use crate::error::is_unique_violation;
use crate::habits::HabitChanges;
use crate::models::{Habit, Millis, Task, User};
use crate::AppError;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建立连接池并执行内嵌的迁移脚本
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {e}")))?;

        Ok(Self::new(pool))
    }
}

const INSERT_HABIT: &str = "INSERT INTO habits
        (id, owner_username, title, done_dates, frequency, status, created_date, updated_date, version)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
     RETURNING *";

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, created_date, updated_date, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(&user.username)
        .bind(user.created_date)
        .bind(user.updated_date)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("User {} already exists", user.username))
            } else {
                AppError::Database(e)
            }
        })
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_habits(&self, owner: &str) -> Result<Vec<Habit>, AppError> {
        let habits = sqlx::query_as::<_, Habit>(
            "SELECT * FROM habits WHERE owner_username = $1 ORDER BY created_date, id",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(habits)
    }

    async fn insert_habit(&self, habit: &Habit) -> Result<Habit, AppError> {
        let habit = sqlx::query_as::<_, Habit>(INSERT_HABIT)
            .bind(habit.id)
            .bind(&habit.owner)
            .bind(&habit.title)
            .bind(&habit.done_dates)
            .bind(&habit.frequency)
            .bind(&habit.status)
            .bind(habit.created_date)
            .bind(habit.updated_date)
            .bind(habit.version)
            .fetch_one(&self.pool)
            .await?;
        Ok(habit)
    }

    async fn set_habit_dates(
        &self,
        id: Uuid,
        dates: &[String],
        now: Millis,
    ) -> Result<Option<Habit>, AppError> {
        let habit = sqlx::query_as::<_, Habit>(
            "UPDATE habits SET
                done_dates = $2,
                updated_date = $3,
                version = version + 1
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(dates)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(habit)
    }

    async fn delete_habit(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM habits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_habit_changes(
        &self,
        owner: &str,
        changes: &HabitChanges,
    ) -> Result<Vec<Habit>, AppError> {
        // 整个同步在一个事务里完成；任何一步失败，tx 被丢弃即自动回滚
        let mut tx = self.pool.begin().await?;

        if !changes.delete.is_empty() {
            sqlx::query("DELETE FROM habits WHERE owner_username = $1 AND id = ANY($2)")
                .bind(owner)
                .bind(&changes.delete)
                .execute(&mut *tx)
                .await?;
        }

        for update in &changes.update {
            sqlx::query(
                "UPDATE habits SET
                    done_dates = $3,
                    updated_date = $4,
                    version = version + 1
                 WHERE id = $1 AND owner_username = $2",
            )
            .bind(update.id)
            .bind(owner)
            .bind(&update.done_dates)
            .bind(changes.now)
            .execute(&mut *tx)
            .await?;
        }

        for habit in &changes.create {
            sqlx::query(INSERT_HABIT)
                .bind(habit.id)
                .bind(&habit.owner)
                .bind(&habit.title)
                .bind(&habit.done_dates)
                .bind(&habit.frequency)
                .bind(&habit.status)
                .bind(habit.created_date)
                .bind(habit.updated_date)
                .bind(habit.version)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        AppError::Conflict(format!("Habit id {} is already taken", habit.id))
                    } else {
                        AppError::Database(e)
                    }
                })?;
        }

        let habits = sqlx::query_as::<_, Habit>(
            "SELECT * FROM habits WHERE owner_username = $1 ORDER BY created_date, id",
        )
        .bind(owner)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(habits)
    }

    async fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, AppError> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM todos WHERE username = $1 ORDER BY created_date, id",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM todos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, AppError> {
        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO todos
                (id, username, title, status, description, category, due_date,
                 completed_date, snooze_date, sort_order, created_date, updated_date, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING *",
        )
        .bind(task.id)
        .bind(&task.owner)
        .bind(&task.title)
        .bind(task.status.as_str())
        .bind(&task.description)
        .bind(&task.category)
        .bind(task.due_date)
        .bind(task.completed_date)
        .bind(task.snooze_date)
        .bind(task.order)
        .bind(task.created_date)
        .bind(task.updated_date)
        .bind(task.version)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        task: &Task,
        expected_version: i64,
    ) -> Result<Option<Task>, AppError> {
        // 版本号作为条件，防止覆盖并发写入
        let task = sqlx::query_as::<_, Task>(
            "UPDATE todos SET
                title = $3,
                status = $4,
                description = $5,
                category = $6,
                due_date = $7,
                completed_date = $8,
                snooze_date = $9,
                sort_order = $10,
                updated_date = $11,
                version = $12
             WHERE id = $1 AND version = $2
             RETURNING *",
        )
        .bind(task.id)
        .bind(expected_version)
        .bind(&task.title)
        .bind(task.status.as_str())
        .bind(&task.description)
        .bind(&task.category)
        .bind(task.due_date)
        .bind(task.completed_date)
        .bind(task.snooze_date)
        .bind(task.order)
        .bind(task.updated_date)
        .bind(task.version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
