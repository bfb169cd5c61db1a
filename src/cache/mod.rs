//! Tag-addressable query cache
//!
//! One [`CacheStore`] per entity kind, grouped in [`Caches`]. Stores are plain
//! values injected where they are needed; there is no global cache.

mod draft;
mod key;
mod store;

use std::sync::Arc;

use board_types::{CalendarItem, Project, ProjectMember, Task};

pub use draft::{Draft, QueryData, UndoOp, UndoToken};
pub use key::{QueryKey, Tag};
pub use store::{CacheEvent, CacheStore, Invalidate};

/// Every per-entity store of one session.
#[derive(Clone, Default)]
pub struct Caches {
    pub projects: Arc<CacheStore<Project>>,
    pub tasks: Arc<CacheStore<Task>>,
    pub members: Arc<CacheStore<ProjectMember>>,
    pub calendar: Arc<CacheStore<CalendarItem>>,
}

impl Caches {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fan out to every store: a project delete also makes the calendar and the
/// task lists stale when the caller names their tags.
impl Invalidate for Caches {
    fn invalidate(&self, tags: &[Tag]) -> Vec<QueryKey> {
        let mut stale = self.projects.invalidate(tags);
        stale.extend(self.tasks.invalidate(tags));
        stale.extend(self.members.invalidate(tags));
        stale.extend(self.calendar.invalidate(tags));
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_types::EntityKind;

    #[test]
    fn test_fan_out_reaches_every_store() {
        let caches = Caches::new();
        caches.projects.put(
            QueryKey::Projects,
            QueryData::List(Vec::new()),
            QueryKey::Projects.default_tags(),
        );
        let month = QueryKey::CalendarMonth {
            year: 2025,
            month: 1,
        };
        caches
            .calendar
            .put(month.clone(), QueryData::List(Vec::new()), month.default_tags());

        let stale = caches.invalidate(&[
            Tag::list(EntityKind::Project),
            Tag::list(EntityKind::Calendar),
        ]);
        assert_eq!(stale.len(), 2);
        assert!(caches.projects.is_stale(&QueryKey::Projects));
        assert!(caches.calendar.is_stale(&month));
    }
}
