//! Query identity and invalidation tags

use board_types::{EntityId, EntityKind};

/// Identity of one cached query: the endpoint paired with its argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Projects,
    ProjectsByOwner(String),
    Project(EntityId),
    Tasks,
    TasksForProject(EntityId),
    Task(EntityId),
    Members(EntityId),
    CalendarMonth { year: i32, month: u32 },
}

impl QueryKey {
    /// Endpoint name, for logs.
    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryKey::Projects => "projects",
            QueryKey::ProjectsByOwner(_) => "projects_by_owner",
            QueryKey::Project(_) => "project",
            QueryKey::Tasks => "tasks",
            QueryKey::TasksForProject(_) => "tasks_for_project",
            QueryKey::Task(_) => "task",
            QueryKey::Members(_) => "members",
            QueryKey::CalendarMonth { .. } => "calendar_month",
        }
    }

    /// Tags a freshly fetched result under this key carries.
    pub fn default_tags(&self) -> Vec<Tag> {
        match self {
            QueryKey::Projects | QueryKey::ProjectsByOwner(_) => {
                vec![Tag::list(EntityKind::Project)]
            }
            QueryKey::Project(id) => vec![Tag::entity(EntityKind::Project, id.clone())],
            QueryKey::Tasks | QueryKey::TasksForProject(_) => vec![Tag::list(EntityKind::Task)],
            QueryKey::Task(id) => vec![Tag::entity(EntityKind::Task, id.clone())],
            QueryKey::Members(_) => vec![Tag::list(EntityKind::Member)],
            QueryKey::CalendarMonth { .. } => vec![Tag::list(EntityKind::Calendar)],
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKey::Projects | QueryKey::Tasks => write!(f, "{}", self.endpoint()),
            QueryKey::ProjectsByOwner(owner) => write!(f, "{}({owner})", self.endpoint()),
            QueryKey::Project(id)
            | QueryKey::TasksForProject(id)
            | QueryKey::Task(id)
            | QueryKey::Members(id) => write!(f, "{}({id})", self.endpoint()),
            QueryKey::CalendarMonth { year, month } => {
                write!(f, "{}({year}-{month:02})", self.endpoint())
            }
        }
    }
}

/// Invalidation label. `id: None` is the collection-level "LIST" tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: EntityKind,
    pub id: Option<EntityId>,
}

impl Tag {
    pub fn list(kind: EntityKind) -> Self {
        Self { kind, id: None }
    }

    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id: Some(id) }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.kind),
            None => write!(f, "{}:LIST", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(QueryKey::Projects.to_string(), "projects");
        assert_eq!(
            QueryKey::TasksForProject(EntityId::Server(4)).to_string(),
            "tasks_for_project(4)"
        );
        assert_eq!(
            QueryKey::CalendarMonth { year: 2025, month: 3 }.to_string(),
            "calendar_month(2025-03)"
        );
    }

    #[test]
    fn test_default_tags() {
        let tags = QueryKey::TasksForProject(EntityId::Server(4)).default_tags();
        assert_eq!(tags, vec![Tag::list(EntityKind::Task)]);
        assert_eq!(tags[0].to_string(), "task:LIST");

        let tags = QueryKey::Project(EntityId::Server(4)).default_tags();
        assert_eq!(tags[0].to_string(), "project:4");
    }
}
