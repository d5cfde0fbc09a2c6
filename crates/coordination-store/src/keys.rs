pub fn pending(sender: &str) -> String {
    format!("pending:{sender}")
}

pub fn cursor(sender: &str) -> String {
    format!("cursor:{sender}")
}

pub fn lock(sender: &str) -> String {
    format!("lock:{sender}")
}

pub fn lock_started_at(sender: &str) -> String {
    format!("lockStartedAt:{sender}")
}

pub fn last_processed(sender: &str) -> String {
    format!("lastProcessed:{sender}")
}

pub fn processing(tx_key: &str) -> String {
    format!("processing:{tx_key}")
}

pub fn broadcasted(tx_key: &str) -> String {
    format!("broadcasted:{tx_key}")
}

pub fn retry(msg_id: &str) -> String {
    format!("retry:{msg_id}")
}

pub fn pool(chain_id: u64, sender: &str) -> String {
    format!("pool:{chain_id}:{sender}")
}

pub fn sender_from_pending_key(key: &str) -> Option<&str> {
    key.strip_prefix("pending:")
}

pub fn sender_from_lock_key(key: &str) -> Option<&str> {
    key.strip_prefix("lock:")
}
