//! Month calendar of task due dates and project deadlines

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use board_client::{GatewayResult, RemoteError};
use board_types::CalendarItem;
use chrono::{Datelike, NaiveDate};

use super::ViewContext;
use crate::cache::QueryKey;
use crate::queries::{ensure_loaded, CalendarQueries};

pub struct CalendarView {
    ctx: ViewContext,
    month: RwLock<(i32, u32)>,
}

impl CalendarView {
    pub fn new(ctx: ViewContext, year: i32, month: u32) -> Self {
        Self {
            ctx,
            month: RwLock::new((year, month)),
        }
    }

    pub fn month(&self) -> (i32, u32) {
        *self.month.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> QueryKey {
        let (year, month) = self.month();
        QueryKey::CalendarMonth { year, month }
    }

    pub async fn mount(&self) -> GatewayResult<()> {
        let key = self.key();
        self.ctx.caches.calendar.subscribe(&key);
        let fetcher = CalendarQueries::new(self.ctx.gateway.clone());
        ensure_loaded(&self.ctx.caches.calendar, &fetcher, &key).await?;
        Ok(())
    }

    pub fn unmount(&self) {
        self.ctx.caches.calendar.unsubscribe(&self.key());
    }

    /// Switch to another month, moving the subscription along.
    pub async fn show_month(&self, year: i32, month: u32) -> GatewayResult<()> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(RemoteError::new(
                "calendar_month",
                format!("invalid month {year}-{month:02}"),
            ));
        }
        self.unmount();
        *self.month.write().unwrap_or_else(PoisonError::into_inner) = (year, month);
        self.mount().await
    }

    pub async fn next_month(&self) -> GatewayResult<()> {
        let (year, month) = self.month();
        let (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        self.show_month(year, month).await
    }

    pub async fn previous_month(&self) -> GatewayResult<()> {
        let (year, month) = self.month();
        let (year, month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
        self.show_month(year, month).await
    }

    pub fn items(&self) -> Vec<CalendarItem> {
        self.ctx.caches.calendar.records(&self.key())
    }

    /// Entries grouped by day of month.
    pub fn days(&self) -> BTreeMap<u32, Vec<CalendarItem>> {
        let mut days: BTreeMap<u32, Vec<CalendarItem>> = BTreeMap::new();
        for item in self.items() {
            days.entry(item.date.day()).or_default().push(item);
        }
        days
    }
}
