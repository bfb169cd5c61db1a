//! Calendar month aggregate
//!
//! The calendar is derived from two collections: tasks contribute their due
//! dates and projects contribute their end dates.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{EntityId, EntityKind, Project, Record, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarItemKind {
    TaskDue,
    ProjectDeadline,
}

/// One dated entry on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarItem {
    /// Id of the task or project this entry was derived from
    pub id: EntityId,
    pub kind: CalendarItemKind,
    pub date: NaiveDate,
    pub title: String,
    pub project_id: EntityId,
}

impl CalendarItem {
    pub fn from_task(task: &Task) -> Option<Self> {
        Some(Self {
            id: task.id.clone(),
            kind: CalendarItemKind::TaskDue,
            date: task.due_date?,
            title: task.title.clone(),
            project_id: task.project_id.clone(),
        })
    }

    pub fn from_project(project: &Project) -> Option<Self> {
        Some(Self {
            id: project.id.clone(),
            kind: CalendarItemKind::ProjectDeadline,
            date: project.end_date?,
            title: project.name.clone(),
            project_id: project.id.clone(),
        })
    }

    pub fn in_month(&self, year: i32, month: u32) -> bool {
        self.date.year() == year && self.date.month() == month
    }
}

impl Record for CalendarItem {
    // Calendar entries are read-only projections.
    type Patch = ();

    const KIND: EntityKind = EntityKind::Calendar;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn apply_patch(&mut self, _patch: &()) {}
}
