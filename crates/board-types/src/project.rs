//! Project records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::{require_emails, require_ordered_dates, require_text};
use crate::{
    EntityId, EntityKind, Priority, ProjectStatus, Record, Speculate, Validate, ValidationError,
};

/// A project as stored in the `projects` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Mutable subset of [`Project`]. Unset fields are left untouched; the
/// nullable columns take `Some(None)` to clear them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::nullable::deserialize"
    )]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::nullable::deserialize"
    )]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::nullable::deserialize"
    )]
    pub end_date: Option<Option<NaiveDate>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self == &ProjectPatch::default()
    }
}

/// Create input for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Invited after the project exists; never part of the inserted row.
    #[serde(skip)]
    pub member_emails: Vec<String>,
}

impl Record for Project {
    type Patch = ProjectPatch;

    const KIND: EntityKind = EntityKind::Project;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn apply_patch(&mut self, patch: &ProjectPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(start) = patch.start_date {
            self.start_date = start;
        }
        if let Some(end) = patch.end_date {
            self.end_date = end;
        }
    }
}

impl Validate for NewProject {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_ordered_dates(self.start_date, self.end_date)?;
        require_emails("member_emails", &self.member_emails)
    }
}

/// A merged record must still be a valid project: a single-date patch can
/// put the end before a start it does not carry.
impl Validate for Project {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_ordered_dates(self.start_date, self.end_date)
    }
}

impl Validate for ProjectPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new("patch", "no fields to update"));
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        require_ordered_dates(self.start_date.flatten(), self.end_date.flatten())
    }
}

impl Speculate<Project> for NewProject {
    fn speculate(&self, id: EntityId, now: DateTime<Utc>) -> Project {
        Project {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            owner_id: self.owner_id.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: EntityId::Server(1),
            name: "Alpha".into(),
            description: None,
            status: ProjectStatus::OnTrack,
            priority: Priority::Medium,
            owner_id: Some("u-1".into()),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            created_at: None,
        }
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut p = project();
        p.apply_patch(&ProjectPatch {
            status: Some(ProjectStatus::Completed),
            ..Default::default()
        });
        assert_eq!(p.status, ProjectStatus::Completed);
        assert_eq!(p.name, "Alpha");
        assert_eq!(p.priority, Priority::Medium);
    }

    #[test]
    fn test_patch_clears_nullable_fields() {
        let mut p = project();
        p.description = Some("draft".into());
        let patch = ProjectPatch {
            description: Some(None),
            end_date: Some(None),
            ..Default::default()
        };
        p.apply_patch(&patch);
        assert_eq!(p.description, None);
        assert_eq!(p.end_date, None);
        assert_eq!(p.start_date, NaiveDate::from_ymd_opt(2025, 1, 1));

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "description": null, "end_date": null })
        );
        let back: ProjectPatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn test_empty_name_fails_validation() {
        let input = NewProject {
            name: "  ".into(),
            ..Default::default()
        };
        assert_eq!(input.validate().unwrap_err().field, "name");
    }

    #[test]
    fn test_merged_end_before_stored_start_fails_validation() {
        let patch = ProjectPatch {
            end_date: Some(NaiveDate::from_ymd_opt(2024, 12, 1)),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());

        let mut merged = project();
        merged.apply_patch(&patch);
        assert_eq!(merged.validate().unwrap_err().field, "end_date");
    }

    #[test]
    fn test_empty_patch_fails_validation() {
        assert!(ProjectPatch::default().validate().is_err());
    }

    #[test]
    fn test_row_deserialises_with_server_id() {
        let row = serde_json::json!({
            "id": 7,
            "name": "Gamma",
            "status": "At risk",
            "priority": "High",
            "start_date": "2025-01-01",
            "end_date": null
        });
        let p: Project = serde_json::from_value(row).unwrap();
        assert_eq!(p.id, EntityId::Server(7));
        assert_eq!(p.status, ProjectStatus::AtRisk);
        assert_eq!(p.end_date, None);
    }

    #[test]
    fn test_member_emails_are_not_inserted() {
        let input = NewProject {
            name: "Beta".into(),
            member_emails: vec!["a@example.com".into()],
            ..Default::default()
        };
        let row = serde_json::to_value(&input).unwrap();
        assert!(row.get("member_emails").is_none());
        assert_eq!(row["status"], "On track");
    }
}
