//! Shared Entity Types for the Project Board
//!
//! This crate is the SINGLE SOURCE OF TRUTH for every record that crosses the
//! synchronization layer: the remote table store, the cache, and the views all
//! speak these types.
//!
//! ## Boundaries
//!
//! ```text
//! ┌──────────────────┐  rows   ┌──────────────────┐  records  ┌──────────────────┐
//! │  Table Store     │ ◄─────► │  Gateway         │ ◄───────► │  Cache / Views   │
//! │  (JSON rows)     │         │  (board-client)  │           │  (board-sync)    │
//! └──────────────────┘         └──────────────────┘           └──────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. One closed record type per entity plus a patch type holding only the
//!    mutable subset
//! 2. Status and priority values are enums with an explicit string table
//! 3. Identifiers are [`EntityId`]: authoritative or temporary, never both

pub mod calendar;
pub mod enums;
pub mod ids;
pub mod member;
pub mod nullable;
pub mod project;
pub mod task;
pub mod validate;

use chrono::{DateTime, Utc};

pub use calendar::{CalendarItem, CalendarItemKind};
pub use enums::{MemberRole, Priority, ProjectStatus, TaskStatus, UnknownVariant};
pub use ids::{EntityId, TempKey};
pub use member::{MemberPatch, NewMember, ProjectMember};
pub use project::{NewProject, Project, ProjectPatch};
pub use task::{NewTask, Task, TaskPatch};
pub use validate::{Validate, ValidationError};

// ============================================================================
// RECORD CONTRACT
// ============================================================================

/// Entity families known to the synchronization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Project,
    Task,
    Member,
    Calendar,
}

impl EntityKind {
    /// Remote collection backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
            EntityKind::Member => "project_members",
            EntityKind::Calendar => "calendar",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::Member => write!(f, "member"),
            EntityKind::Calendar => write!(f, "calendar"),
        }
    }
}

/// A closed entity record with a stable identifier.
///
/// `Patch` expresses only the fields a mutation may change, so speculative and
/// authoritative records can never drift in shape.
pub trait Record: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    type Patch: Clone + std::fmt::Debug + Send + Sync + 'static;

    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    /// Shallow-merge the set fields of `patch` onto this record.
    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// Builds the speculative record shown before the server confirms a create.
pub trait Speculate<E: Record> {
    fn speculate(&self, id: EntityId, now: DateTime<Utc>) -> E;
}
