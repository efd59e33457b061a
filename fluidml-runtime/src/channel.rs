//! Thin wrapper around [tokio::sync::mpsc] giving the scheduler a single,
//! named vocabulary for the one channel shape it needs: many workers
//! reporting completion to the one dispatch loop that owns
//! `ready`/`running`/`done` (§4.4, §9 — "the scheduler's shared mutable
//! state should be ... an actor owning it, with workers sending
//! completion messages").

use tokio::sync::mpsc;

/// Sender half of a bounded completion [Channel].
pub type ChannelSender<T> = mpsc::Sender<T>;

/// Receiver half of a bounded completion [Channel].
pub type ChannelReceiver<T> = mpsc::Receiver<T>;

/// Create a bounded completion channel of type `T`, sized for
/// `worker_count` concurrently in-flight workers: a worker can always
/// report its own completion without blocking on a slow dispatch loop.
pub fn bounded<T>(worker_count: usize) -> (ChannelSender<T>, ChannelReceiver<T>) {
    mpsc::channel(worker_count.max(1))
}
