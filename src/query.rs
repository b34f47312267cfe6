// src/query.rs
//! 任务列表的筛选、排序、分组与计数。
//! 纯函数，不访问存储；输入应是已经过推迟到期处理的任务集合。
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskStatus};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// `Due`: 先按截止日期，再按更新时间；`Updated`: 只看更新时间（已完成历史）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Due,
    Updated,
}

// --- 1. 筛选 ---

/// 标题或分类中包含 `needle`（忽略大小写）。空字符串表示不过滤。
pub fn filter_by_text(tasks: Vec<Task>, needle: &str) -> Vec<Task> {
    if needle.is_empty() {
        return tasks;
    }
    let needle = needle.to_lowercase();
    tasks
        .into_iter()
        .filter(|task| {
            task.title.to_lowercase().contains(&needle)
                || task
                    .category
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
        })
        .collect()
}

/// 分类完全相等（忽略大小写）
pub fn filter_by_category(tasks: Vec<Task>, category: &str) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| {
            task.category
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == category.to_lowercase())
        })
        .collect()
}

pub fn filter_by_status(tasks: Vec<Task>, status: TaskStatus) -> Vec<Task> {
    tasks.into_iter().filter(|t| t.status == status).collect()
}

// --- 2. 排序 ---

fn by_updated(a: &Task, b: &Task, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => a.updated_date.cmp(&b.updated_date),
        SortOrder::Desc => b.updated_date.cmp(&a.updated_date),
    }
}

/// 没有截止日期的任务排在最后；截止日期总是升序，`order` 只影响次级键
pub fn compare_by_due(a: &Task, b: &Task, order: SortOrder) -> Ordering {
    let due = |t: &Task| t.due_date.unwrap_or(i64::MAX);
    due(a)
        .cmp(&due(b))
        .then_with(|| by_updated(a, b, order))
}

pub fn sort_by_due(tasks: &mut [Task], order: SortOrder) {
    tasks.sort_by(|a, b| compare_by_due(a, b, order));
}

pub fn sort_by_updated(tasks: &mut [Task], order: SortOrder) {
    tasks.sort_by(|a, b| by_updated(a, b, order));
}

pub fn sort_tasks(tasks: &mut [Task], key: SortKey, order: SortOrder) {
    match key {
        SortKey::Due => sort_by_due(tasks, order),
        SortKey::Updated => sort_by_updated(tasks, order),
    }
}

// --- 3. 按状态分组与计数 ---

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatusBuckets {
    pub incomplete: Vec<Task>,
    pub complete: Vec<Task>,
    pub archived: Vec<Task>,
    pub snoozed: Vec<Task>,
}

/// 分组后每组内保持输入顺序
pub fn partition_by_status(tasks: Vec<Task>) -> StatusBuckets {
    let mut buckets = StatusBuckets::default();
    for task in tasks {
        match task.status {
            TaskStatus::Incomplete => buckets.incomplete.push(task),
            TaskStatus::Complete => buckets.complete.push(task),
            TaskStatus::Archived => buckets.archived.push(task),
            TaskStatus::Snoozed => buckets.snoozed.push(task),
        }
    }
    buckets
}

/// 所有键始终存在，没有的状态计 0
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub incomplete: usize,
    pub complete: usize,
    pub archived: usize,
    pub snoozed: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Incomplete => self.incomplete,
            TaskStatus::Complete => self.complete,
            TaskStatus::Archived => self.archived,
            TaskStatus::Snoozed => self.snoozed,
        }
    }
}

pub fn count_by_status(tasks: &[Task]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for task in tasks {
        match task.status {
            TaskStatus::Incomplete => counts.incomplete += 1,
            TaskStatus::Complete => counts.complete += 1,
            TaskStatus::Archived => counts.archived += 1,
            TaskStatus::Snoozed => counts.snoozed += 1,
        }
        counts.total += 1;
    }
    counts
}

// --- 4. 组合 (GET /todos 的查询参数) ---

#[derive(Debug, Default, Clone)]
pub struct TaskView {
    pub text: Option<String>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

impl TaskView {
    /// 文本筛选优先于分类筛选（两者在界面上互斥）；未指定排序则保持存储顺序
    pub fn apply(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        if let Some(status) = self.status {
            tasks = filter_by_status(tasks, status);
        }
        match (self.text.as_deref(), self.category.as_deref()) {
            (Some(text), _) if !text.is_empty() => tasks = filter_by_text(tasks, text),
            (_, Some(category)) if !category.is_empty() => {
                tasks = filter_by_category(tasks, category)
            }
            _ => {}
        }
        if self.sort.is_some() || self.order.is_some() {
            sort_tasks(
                &mut tasks,
                self.sort.unwrap_or_default(),
                self.order.unwrap_or_default(),
            );
        }
        tasks
    }
}
