//! Per-screen controllers
//!
//! A view owns UI-shaped state (form fields, dialog, selection) and exposes
//! intents that go through the [`MutationCoordinator`]. Views read the cache
//! and project records into display rows; they never write to it directly.
//!
//! Every view is `Sync` and its intents take `&self`, so one view can be
//! shared by the rendering loop and the tasks awaiting remote calls.

pub mod calendar;
pub mod derive;
pub mod members;
pub mod projects;
pub mod tasks;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use board_client::BoardGateway;
use board_types::EntityId;
use tokio::task::JoinHandle;

use crate::cache::Caches;
use crate::config::DisplayConfig;
use crate::notify::Notifier;
use crate::optimistic::MutationCoordinator;
use crate::queries::{spawn_refetcher, CalendarQueries, MemberQueries, ProjectQueries, TaskQueries};

pub use calendar::CalendarView;
pub use members::{MemberRow, MembersView};
pub use projects::{ProjectField, ProjectForm, ProjectRow, ProjectsView};
pub use tasks::{TaskField, TaskForm, TaskRow, TasksView};

/// Everything a view needs, shared by all views of one session.
#[derive(Clone)]
pub struct ViewContext {
    pub gateway: BoardGateway,
    pub caches: Caches,
    pub coordinator: MutationCoordinator,
    pub display: DisplayConfig,
}

impl ViewContext {
    pub fn new(
        gateway: BoardGateway,
        caches: Caches,
        notifier: Arc<dyn Notifier>,
        display: DisplayConfig,
    ) -> Self {
        let coordinator = MutationCoordinator::new(notifier, Arc::new(caches.clone()));
        Self {
            gateway,
            caches,
            coordinator,
            display,
        }
    }

    /// One background refetcher per entity store.
    pub fn spawn_refetchers(&self) -> Vec<JoinHandle<()>> {
        vec![
            spawn_refetcher(
                &self.caches.projects,
                Arc::new(ProjectQueries::new(self.gateway.clone())),
            ),
            spawn_refetcher(
                &self.caches.tasks,
                Arc::new(TaskQueries::new(self.gateway.clone())),
            ),
            spawn_refetcher(
                &self.caches.members,
                Arc::new(MemberQueries::new(self.gateway.clone())),
            ),
            spawn_refetcher(
                &self.caches.calendar,
                Arc::new(CalendarQueries::new(self.gateway.clone())),
            ),
        ]
    }
}

/// Dialog state.
///
/// Using an enum prevents impossible states like an edit form and a delete
/// confirmation being open at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dialog {
    #[default]
    Closed,
    Create,
    Edit(EntityId),
    ConfirmDelete(Vec<EntityId>),
}

impl Dialog {
    pub fn is_open(&self) -> bool {
        !matches!(self, Dialog::Closed)
    }
}

/// Single in-flight flag shared by every intent of a view.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    /// Claim the flag, or `None` if a submission is already running.
    pub fn try_claim(&self) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, whichever way the intent returns.
#[derive(Debug)]
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_blocks_second_claim_until_dropped() {
        let flag = InFlight::default();
        let guard = flag.try_claim();
        assert!(guard.is_some());
        assert!(flag.is_busy());
        assert!(flag.try_claim().is_none());

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_claim().is_some());
    }

    #[test]
    fn test_dialog_default_is_closed() {
        assert!(!Dialog::default().is_open());
        assert!(Dialog::ConfirmDelete(vec![EntityId::Server(1)]).is_open());
    }
}
