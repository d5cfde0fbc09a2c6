use broadcast_models::QueuedTransaction;
use dashmap::DashMap;

/// In-memory reorder buffer: items whose nonce is ahead of the sender's
/// expected nonce. Rebuilt lazily from `pending` as gaps are discovered —
/// never persisted, per the ownership note that the buffer belongs to
/// whichever worker process currently holds the sender's lock.
#[derive(Default)]
pub struct ReorderBuffer {
    by_sender: DashMap<String, Vec<QueuedTransaction>>,
}

impl ReorderBuffer {
    pub fn insert(&self, sender: &str, tx: QueuedTransaction) {
        let mut entry = self.by_sender.entry(sender.to_string()).or_default();
        if let Some(existing) = entry.iter_mut().find(|t| t.nonce == tx.nonce) {
            if tx.priority >= existing.priority {
                *existing = tx;
            }
        } else {
            entry.push(tx);
        }
        entry.sort_by_key(|t| t.nonce);
    }

    pub fn take_if_next(&self, sender: &str, expected: u64) -> Option<QueuedTransaction> {
        let mut entry = self.by_sender.get_mut(sender)?;
        if entry.first().map(|t| t.nonce) == Some(expected) {
            Some(entry.remove(0))
        } else {
            None
        }
    }

    pub fn pop_smallest(&self, sender: &str) -> Option<QueuedTransaction> {
        let mut entry = self.by_sender.get_mut(sender)?;
        if entry.is_empty() {
            None
        } else {
            Some(entry.remove(0))
        }
    }

    pub fn is_empty(&self, sender: &str) -> bool {
        self.by_sender.get(sender).map(|v| v.is_empty()).unwrap_or(true)
    }

    pub fn smallest_nonce(&self, sender: &str) -> Option<u64> {
        self.by_sender.get(sender).and_then(|v| v.first().map(|t| t.nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcast_models::{ChainContext, MessageKind};
    use chrono::Utc;

    fn tx(nonce: u64) -> QueuedTransaction {
        QueuedTransaction {
            signed_payload: "0x00".into(),
            tx_hash: format!("0xh{nonce}"),
            nonce,
            sender_address: "0xsender".into(),
            chain_context: ChainContext {
                chain: "ethereum".into(),
                network: "mainnet".into(),
                chain_id: 1,
            },
            request_id: "r1".into(),
            kind: MessageKind::Single,
            batch_id: None,
            enqueued_at: Utc::now(),
            priority: 0,
        }
    }

    #[test]
    fn drains_in_ascending_order_once_reachable() {
        let buf = ReorderBuffer::default();
        buf.insert("s", tx(7));
        buf.insert("s", tx(6));
        assert!(buf.take_if_next("s", 5).is_none());
        let drained = buf.take_if_next("s", 6).unwrap();
        assert_eq!(drained.nonce, 6);
        let drained = buf.take_if_next("s", 7).unwrap();
        assert_eq!(drained.nonce, 7);
        assert!(buf.is_empty("s"));
    }

    #[test]
    fn higher_priority_replaces_same_nonce() {
        let buf = ReorderBuffer::default();
        buf.insert("s", tx(9));
        let mut higher = tx(9);
        higher.priority = 5;
        buf.insert("s", higher);
        assert_eq!(buf.smallest_nonce("s"), Some(9));
        let drained = buf.take_if_next("s", 9).unwrap();
        assert_eq!(drained.priority, 5);
    }
}
