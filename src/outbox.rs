use crate::user::UserId;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("could not deliver message to user {0}")]
pub struct SendError(pub UserId);

/// The one capability the core needs from the chat platform: deliver a
/// text to a user. Workers and the scheduler share a single instance.
pub trait Outbox: Send + Sync {
    fn send(&self, user_id: UserId, message: &str) -> Result<(), SendError>;
}

/// Delivers replies by POSTing them to the chat platform's send endpoint.
pub struct HttpOutbox {
    url: String,
    attempts: u32,
    backoff: Duration,
}

impl HttpOutbox {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl Outbox for HttpOutbox {
    /// Sends with a fixed backoff between attempts. Delivery stays
    /// best-effort: after the last attempt the error is handed back for
    /// the caller to log, nothing is queued for later.
    fn send(&self, user_id: UserId, message: &str) -> Result<(), SendError> {
        let body = serde_json::json!({
            "user_id": user_id,
            "message": message,
        })
        .to_string();

        for attempt in 1..=self.attempts {
            let res = ureq::post(&self.url)
                .set("Content-Type", "application/json")
                .send_string(&body);

            match res {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(user_id, attempt, "send failed: {}", e);
                    if attempt < self.attempts {
                        thread::sleep(self.backoff);
                    }
                }
            }
        }

        Err(SendError(user_id))
    }
}

/// An outbox that keeps every message in memory. Useful for testing.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything sent so far, draining the log
    pub fn take(&self) -> Vec<(UserId, String)> {
        let mut sent = self
            .sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *sent)
    }
}

impl Outbox for MemoryOutbox {
    fn send(&self, user_id: UserId, message: &str) -> Result<(), SendError> {
        let mut sent = self
            .sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sent.push((user_id, message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{MemoryOutbox, Outbox};

    #[test]
    fn test_memory_outbox_records_in_order() {
        let outbox = MemoryOutbox::new();
        outbox.send(1, "first").unwrap();
        outbox.send(2, "second").unwrap();

        assert_eq!(
            outbox.take(),
            [(1, String::from("first")), (2, String::from("second"))]
        );
        assert!(outbox.take().is_empty());
    }
}
