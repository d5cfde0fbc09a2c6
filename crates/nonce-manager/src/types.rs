use broadcast_models::QueuedTransaction;
use chrono::{DateTime, Utc};

/// Observed, not authoritative — the real state lives in the pending list
/// and lock keys in the Coordination Store. Exposed for introspection and
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Queued,
    Processing,
    Gapped,
    TimeoutRecovered,
}

#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Ready(QueuedTransaction),
    Gap { waiting_for: u64 },
}

#[derive(Debug, Clone)]
pub struct SenderWorkload {
    pub sender: String,
    pub pending_len: usize,
    pub locked: bool,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Pure ordering function for `spec.md` §4.5 fairness: unlocked senders
/// first, longest pending list first, oldest `lastProcessedAt` as tiebreak.
pub fn fairness_order(mut senders: Vec<SenderWorkload>) -> Vec<SenderWorkload> {
    senders.sort_by(|a, b| {
        a.locked
            .cmp(&b.locked)
            .then(b.pending_len.cmp(&a.pending_len))
            .then(a.last_processed_at.cmp(&b.last_processed_at))
    });
    senders
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(sender: &str, pending_len: usize, locked: bool, age_secs: i64) -> SenderWorkload {
        SenderWorkload {
            sender: sender.to_string(),
            pending_len,
            locked,
            last_processed_at: Some(Utc::now() - chrono::Duration::seconds(age_secs)),
        }
    }

    #[test]
    fn unlocked_senders_come_before_locked() {
        let ordered = fairness_order(vec![workload("a", 1, true, 0), workload("b", 1, false, 0)]);
        assert_eq!(ordered[0].sender, "b");
    }

    #[test]
    fn longer_pending_list_wins_among_unlocked() {
        let ordered = fairness_order(vec![workload("a", 1, false, 0), workload("b", 5, false, 0)]);
        assert_eq!(ordered[0].sender, "b");
    }

    #[test]
    fn oldest_last_processed_breaks_ties() {
        let ordered = fairness_order(vec![workload("a", 2, false, 5), workload("b", 2, false, 50)]);
        assert_eq!(ordered[0].sender, "b");
    }
}
