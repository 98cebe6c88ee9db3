//! # Recovery Buffer
//!
//! Holds at most one just-deleted page so it can be restored.
//!
//! ```text
//!   active ──delete──▶ pending ──undo (now < deadline)──▶ active (original index)
//!                         │
//!                         ├── deadline passes ──────────▶ gone
//!                         └── another delete evicts it ─▶ gone
//! ```
//!
//! The expiry "timer" is the deadline stored with the held page. Replacing or
//! undoing the entry drops the deadline with it, so there is nothing left to
//! cancel. Every transition takes `&mut self` and is decided against the `now`
//! passed in: an undo wins iff `now < deadline`, an expiry happens iff
//! `now >= deadline`. The same instant can never both restore and expire.

use crate::model::Page;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion {
    pub page: Page,
    pub original_index: usize,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecoveryBuffer {
    window: Duration,
    slot: Option<PendingDeletion>,
}

impl RecoveryBuffer {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or(Duration::MAX),
            slot: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Holds `page` (flagged deleted) until `now + window`. Any page already
    /// held is evicted and returned; it is gone for good.
    pub fn hold(
        &mut self,
        mut page: Page,
        original_index: usize,
        now: DateTime<Utc>,
    ) -> Option<Page> {
        page.is_deleted = true;
        page.deleted_at = Some(now);
        let deadline = now
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        debug!(page = %page.id, index = original_index, %deadline, "page held for recovery");
        let evicted = self.slot.replace(PendingDeletion {
            page,
            original_index,
            deadline,
        });
        evicted.map(|pending| {
            info!(page = %pending.page.id, "recovery slot evicted by a newer deletion");
            pending.page
        })
    }

    /// Takes the held page back if its deadline has not passed, with the
    /// deletion flags cleared.
    pub fn undo(&mut self, now: DateTime<Utc>) -> Option<(Page, usize)> {
        self.expire(now);
        let pending = self.slot.take()?;
        let mut page = pending.page;
        page.is_deleted = false;
        page.deleted_at = None;
        info!(page = %page.id, index = pending.original_index, "deleted page restored");
        Some((page, pending.original_index))
    }

    /// Drops the held page once its deadline has passed. Returns it if it expired.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Page> {
        if self.slot.as_ref().is_some_and(|p| now >= p.deadline) {
            let pending = self.slot.take()?;
            info!(page = %pending.page.id, "recovery window elapsed");
            return Some(pending.page);
        }
        None
    }

    /// Drops the held page now, whatever its deadline.
    pub fn discard(&mut self) -> Option<Page> {
        let pending = self.slot.take()?;
        info!(page = %pending.page.id, "recovery slot discarded");
        Some(pending.page)
    }

    pub fn pending(&self) -> Option<&PendingDeletion> {
        self.slot.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.slot.as_ref().map(|p| p.deadline)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::create_page;
    use crate::model::now;

    fn buffer() -> RecoveryBuffer {
        RecoveryBuffer::new(std::time::Duration::from_secs(10))
    }

    #[test]
    fn undo_inside_window_returns_page_and_index() {
        let mut buffer = buffer();
        let t0 = now();
        let page = create_page("Doomed", None);

        assert!(buffer.hold(page.clone(), 2, t0).is_none());
        assert!(buffer.pending().unwrap().page.is_deleted);

        let (restored, index) = buffer.undo(t0 + Duration::seconds(9)).unwrap();
        assert_eq!(index, 2);
        assert_eq!(restored, page);
        assert!(buffer.is_empty());
    }

    #[test]
    fn undo_at_deadline_loses() {
        let mut buffer = buffer();
        let t0 = now();
        buffer.hold(create_page("Doomed", None), 0, t0);

        assert!(buffer.undo(t0 + Duration::seconds(10)).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn second_hold_evicts_first() {
        let mut buffer = buffer();
        let t0 = now();
        let first = create_page("First", None);
        buffer.hold(first.clone(), 0, t0);

        let evicted = buffer.hold(create_page("Second", None), 1, t0).unwrap();
        assert_eq!(evicted.id, first.id);

        let (restored, _) = buffer.undo(t0).unwrap();
        assert_eq!(restored.title, "Second");
        assert!(buffer.undo(t0).is_none());
    }

    #[test]
    fn expire_only_after_deadline() {
        let mut buffer = buffer();
        let t0 = now();
        buffer.hold(create_page("Doomed", None), 0, t0);

        assert!(buffer.expire(t0 + Duration::seconds(5)).is_none());
        assert_eq!(buffer.deadline(), Some(t0 + Duration::seconds(10)));
        assert!(buffer.expire(t0 + Duration::seconds(10)).is_some());
        assert!(buffer.pending().is_none());
    }

    #[test]
    fn discard_empties_slot_immediately() {
        let mut buffer = buffer();
        let t0 = now();
        buffer.hold(create_page("Doomed", None), 0, t0);

        assert_eq!(buffer.discard().unwrap().title, "Doomed");
        assert!(buffer.undo(t0).is_none());
    }

    #[test]
    fn huge_window_saturates() {
        let mut buffer = RecoveryBuffer::new(std::time::Duration::from_secs(u64::MAX));
        let t0 = now();
        buffer.hold(create_page("Kept", None), 0, t0);
        assert_eq!(buffer.deadline(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(buffer.undo(t0 + Duration::days(365)).is_some());
    }
}
