// src/habits.rs
//! 习惯的增删改查，以及整组习惯的批量同步。
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::models::{
    now_millis, ChangeCounts, Habit, Millis, ReconcileResponse, SubmittedHabit,
};
use crate::store::Store;
use crate::users::get_user;
use crate::AppError;

static DONE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}/\d{2}/\d{2}$").expect("static regex"));

// --- 1. 打卡日期校验 ---

/// 格式必须是 `YYYY/MM/DD`，且是真实存在的日期（拒绝 2023/02/29 之类）
pub fn is_valid_done_date(date: &str) -> bool {
    DONE_DATE.is_match(date) && NaiveDate::parse_from_str(date, "%Y/%m/%d").is_ok()
}

pub fn validate_done_dates(dates: &[String]) -> Result<(), AppError> {
    match dates.iter().find(|d| !is_valid_done_date(d)) {
        Some(bad) => Err(AppError::BadRequest(format!(
            "Invalid date in date array: {bad}"
        ))),
        None => Ok(()),
    }
}

// --- 2. 单个习惯 ---

pub async fn create_habit(store: &dyn Store, owner: &str, title: &str) -> Result<Habit, AppError> {
    get_user(store, owner).await?;

    let now = now_millis();
    let habit = store
        .insert_habit(&Habit {
            id: Uuid::new_v4(),
            owner: owner.to_owned(),
            title: title.to_owned(),
            done_dates: Vec::new(),
            frequency: None,
            status: None,
            created_date: now,
            updated_date: now,
            version: 0,
        })
        .await?;

    tracing::debug!(owner, habit_id = %habit.id, "habit created");
    Ok(habit)
}

pub async fn list_habits(store: &dyn Store, owner: &str) -> Result<Vec<Habit>, AppError> {
    get_user(store, owner).await?;
    store.list_habits(owner).await
}

pub async fn set_done_dates(
    store: &dyn Store,
    id: Uuid,
    dates: &[String],
) -> Result<Habit, AppError> {
    validate_done_dates(dates)?;
    store
        .set_habit_dates(id, dates, now_millis())
        .await?
        .ok_or_else(|| AppError::NotFound("Habit not found".to_string()))
}

pub async fn delete_habit(store: &dyn Store, id: Uuid) -> Result<bool, AppError> {
    store.delete_habit(id).await
}

// --- 3. 批量同步 ---

#[derive(Debug, Clone, PartialEq)]
pub struct DatesUpdate {
    pub id: Uuid,
    pub done_dates: Vec<String>,
}

/// 一次同步需要落库的全部变更
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitChanges {
    pub delete: Vec<Uuid>,
    pub update: Vec<DatesUpdate>,
    pub create: Vec<Habit>,
    pub now: Millis,
}

impl HabitChanges {
    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            deleted: self.delete.len(),
            updated: self.update.len(),
            created: self.create.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty() && self.create.is_empty()
    }
}

/// 以 id 为键对比服务端现有习惯与客户端提交的整组习惯：
/// - 未出现在提交中的现有习惯 -> 删除
/// - 两边都有且日期数组（按顺序、按长度）不同 -> 更新日期；未提交 doneDates 则保持不变
/// - 只在提交中出现（或没有 id）的 -> 新建，审计字段由服务端生成
///
/// 同一 id 重复提交时以第一次出现为准。
pub fn plan_reconcile(
    owner: &str,
    existing: &[Habit],
    submitted: Vec<SubmittedHabit>,
    now: Millis,
) -> Result<HabitChanges, AppError> {
    for dates in submitted.iter().filter_map(|h| h.done_dates.as_ref()) {
        validate_done_dates(dates)?;
    }

    let mut seen = HashSet::new();
    let submitted: Vec<SubmittedHabit> = submitted
        .into_iter()
        .filter(|h| h.id.map_or(true, |id| seen.insert(id)))
        .collect();

    let by_id: HashMap<Uuid, &SubmittedHabit> = submitted
        .iter()
        .filter_map(|h| h.id.map(|id| (id, h)))
        .collect();
    let existing_ids: HashSet<Uuid> = existing.iter().map(|h| h.id).collect();

    let mut changes = HabitChanges {
        now,
        ..HabitChanges::default()
    };

    for habit in existing {
        match by_id.get(&habit.id) {
            None => changes.delete.push(habit.id),
            Some(incoming) => match &incoming.done_dates {
                Some(dates) if *dates != habit.done_dates => {
                    changes.update.push(DatesUpdate {
                        id: habit.id,
                        done_dates: dates.clone(),
                    });
                }
                _ => {}
            },
        }
    }

    for incoming in submitted {
        if incoming.id.is_some_and(|id| existing_ids.contains(&id)) {
            continue;
        }
        let title = incoming
            .title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::BadRequest("New habits need a title".to_string()))?;
        changes.create.push(Habit {
            id: incoming.id.unwrap_or_else(Uuid::new_v4),
            owner: owner.to_owned(),
            title,
            done_dates: incoming.done_dates.unwrap_or_default(),
            frequency: incoming.frequency,
            status: incoming.status,
            created_date: now,
            updated_date: now,
            version: 0,
        });
    }

    Ok(changes)
}

/// 用客户端提交的整组习惯替换该用户的习惯集合
pub async fn reconcile(
    store: &dyn Store,
    owner: &str,
    submitted: Vec<SubmittedHabit>,
) -> Result<ReconcileResponse, AppError> {
    get_user(store, owner).await?;

    let existing = store.list_habits(owner).await?;
    let changes = plan_reconcile(owner, &existing, submitted, now_millis())?;
    let counts = changes.counts();

    let habits = if changes.is_empty() {
        existing
    } else {
        store.apply_habit_changes(owner, &changes).await?
    };

    tracing::info!(
        owner,
        deleted = counts.deleted,
        updated = counts.updated,
        created = counts.created,
        "habits reconciled"
    );

    Ok(ReconcileResponse {
        changes: counts,
        habits,
    })
}
