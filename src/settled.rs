//! A single-shot, multi-observer settable value.
//!
//! `tokio::sync::oneshot` only supports one receiver, but the Journey (D)
//! needs several concurrent callers to await the *same* in-flight document
//! without consuming it (spec §4.4, §9 "Futures"). `tokio::sync::watch` —
//! already used by this crate's lineage for agent lifecycle state
//! (`ubl_office::runtime::Office`) — gives exactly that: cheap clones,
//! non-blocking observation, and a "changed" notification every awaiter can
//! subscribe to independently.

use tokio::sync::watch;

/// A value that starts unset and is settled at most once. Clones are cheap
/// and observe the same underlying state.
#[derive(Debug, Clone)]
pub struct Settled<T: Clone + Send + Sync + 'static> {
    rx: watch::Receiver<Option<T>>,
}

/// The write half: settles the paired [`Settled`] exactly once.
#[derive(Debug)]
pub struct Settler<T: Clone + Send + Sync + 'static> {
    tx: watch::Sender<Option<T>>,
}

/// Create a settled/settler pair, analogous to `oneshot::channel` but with
/// many readers.
pub fn pair<T: Clone + Send + Sync + 'static>() -> (Settled<T>, Settler<T>) {
    let (tx, rx) = watch::channel(None);
    (Settled { rx }, Settler { tx })
}

impl<T: Clone + Send + Sync + 'static> Settled<T> {
    /// Wait until the value is settled, then return a clone of it.
    ///
    /// If the value is already settled, returns immediately.
    pub async fn wait(&self) -> T {
        let mut rx = self.rx.clone();
        loop {
            if let Some(value) = rx.borrow().clone() {
                return value;
            }
            if rx.changed().await.is_err() {
                // Settler dropped without settling: treat the borrowed
                // snapshot as final (it can only be None here, which callers
                // should never observe in practice — the journey always
                // settles before dropping the settler).
                if let Some(value) = rx.borrow().clone() {
                    return value;
                }
                // No legitimate caller reaches this branch in this crate;
                // loop rather than panic, since a fresh settler may not have
                // been installed yet in a pathological racing test.
                continue;
            }
        }
    }

    /// Non-blocking peek: `Some(value)` only once settled.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.rx.borrow().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Settler<T> {
    /// Settle the paired value. Subsequent calls are ignored (a `Settled`
    /// can only ever move from unset to one final value).
    pub fn settle(self, value: T) {
        let _ = self.tx.send(Some(value));
    }
}
