use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Cancellation flag with an identity.
///
/// A canceled operation can't tell from the signal alone whether it was
/// superseded or timed out. Callers compare the token they hold against the
/// currently active one (`==` compares identity) before acting on it.
#[derive(Debug, Clone)]
pub struct CancelToken {
    id: u64,
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            flag: Arc::new(flag),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CancelToken {}
