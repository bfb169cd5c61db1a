//! Project membership (relation table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::require_emails;
use crate::{EntityId, EntityKind, MemberRole, Record, Speculate, Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: EntityId,
    pub project_id: EntityId,
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMember {
    pub project_id: EntityId,
    pub email: String,
    pub role: MemberRole,
}

impl Record for ProjectMember {
    type Patch = MemberPatch;

    const KIND: EntityKind = EntityKind::Member;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn apply_patch(&mut self, patch: &MemberPatch) {
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}

impl Validate for NewMember {
    fn validate(&self) -> Result<(), ValidationError> {
        require_emails("email", std::iter::once(&self.email))?;
        if self.project_id.is_temporary() {
            return Err(ValidationError::new(
                "project_id",
                "project is still being created",
            ));
        }
        Ok(())
    }
}

impl Speculate<ProjectMember> for NewMember {
    fn speculate(&self, id: EntityId, now: DateTime<Utc>) -> ProjectMember {
        ProjectMember {
            id,
            project_id: self.project_id.clone(),
            email: self.email.clone(),
            role: self.role,
            added_at: Some(now),
        }
    }
}
