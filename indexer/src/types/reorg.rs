//! Transient state tracked while a reorg is in progress (§3.1, §4.5).

use chrono::{DateTime, Utc};

use super::primitives::BlockNumber;

/// Lifecycle state of a `ReorgTicket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorgStatus {
    /// The Reorg Coordinator is actively walking back or rewinding.
    InProgress,
    /// The rewind committed successfully.
    Done,
    /// The walkback exceeded `max_reorg_depth`, or a stale ticket was
    /// superseded.
    Failed,
}

/// Transient record of a reorg in progress, used to reject overlapping
/// reorgs and to time out stale ones (>10 minutes, §3.1).
#[derive(Debug, Clone)]
pub struct ReorgTicket {
    /// Height at which the parent-hash mismatch was first observed.
    pub start_height: BlockNumber,
    /// Fork point once resolved; `None` while still walking back.
    pub fork_height: Option<BlockNumber>,
    /// When this ticket was created.
    pub detected_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: ReorgStatus,
}

impl ReorgTicket {
    /// Create a new in-progress ticket for a mismatch observed at
    /// `start_height`.
    #[must_use]
    pub fn new(start_height: BlockNumber, now: DateTime<Utc>) -> Self {
        Self { start_height, fork_height: None, detected_at: now, status: ReorgStatus::InProgress }
    }

    /// A ticket is stale if it has been `InProgress` for longer than the
    /// given ceiling (10 minutes per §3.1/§5).
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, ceiling: chrono::Duration) -> bool {
        self.status == ReorgStatus::InProgress && now - self.detected_at > ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ticket_is_not_stale() {
        let now = Utc::now();
        let ticket = ReorgTicket::new(BlockNumber::new(100), now);
        assert!(!ticket.is_stale(now, chrono::Duration::minutes(10)));
    }

    #[test]
    fn ticket_older_than_ceiling_is_stale() {
        let detected_at = Utc::now() - chrono::Duration::minutes(11);
        let ticket = ReorgTicket::new(BlockNumber::new(100), detected_at);
        assert!(ticket.is_stale(Utc::now(), chrono::Duration::minutes(10)));
    }

    #[test]
    fn done_ticket_is_never_stale() {
        let detected_at = Utc::now() - chrono::Duration::minutes(20);
        let mut ticket = ReorgTicket::new(BlockNumber::new(100), detected_at);
        ticket.status = ReorgStatus::Done;
        assert!(!ticket.is_stale(Utc::now(), chrono::Duration::minutes(10)));
    }
}
