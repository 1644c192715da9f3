//! Minimal in-process pub/sub used internally to couple the frame
//! decoder, the opcode handler, and the heartbeat handler within one
//! shard — mirrors `snakecord`'s `EventPusher` base class, which every
//! `BaseConnection`/`Shard` inherits from.
//!
//! Listeners registered under a name are invoked, in registration order,
//! every time that name is pushed. [`EventPusher::wait`] additionally
//! lets a caller await the *next* occurrence of a named event with a
//! timeout — used by the heartbeat handler to await `heartbeat_ack`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

/// A named, in-process event you can both subscribe to (`register_listener`)
/// and one-shot await (`wait`).
pub struct EventPusher<E: Clone + Send + 'static> {
    listeners: Mutex<HashMap<&'static str, Vec<Box<dyn Fn(&E) + Send + Sync>>>>,
    channels: Mutex<HashMap<&'static str, broadcast::Sender<E>>>,
}

impl<E: Clone + Send + 'static> Default for EventPusher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> EventPusher<E> {
    pub fn new() -> Self {
        EventPusher {
            listeners: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Register `listener` to run, in order, whenever `name` is pushed.
    pub fn register_listener<F>(&self, name: &'static str, listener: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .expect("event pusher listener lock poisoned")
            .entry(name)
            .or_default()
            .push(Box::new(listener));
    }

    /// Push `event` under `name`: run every registered listener in
    /// registration order, then wake any pending `wait` calls.
    pub fn push_event(&self, name: &'static str, event: E) {
        if let Some(listeners) = self
            .listeners
            .lock()
            .expect("event pusher listener lock poisoned")
            .get(name)
        {
            for listener in listeners {
                listener(&event);
            }
        }
        if let Some(sender) = self.channels.lock().expect("event pusher channel lock poisoned").get(name) {
            // No active waiters is not an error; the event simply has no
            // one-shot subscriber this time.
            let _ = sender.send(event);
        }
    }

    /// Await the next occurrence of `name`, failing with
    /// [`PusherError::Timeout`] if none arrives within `timeout`.
    pub async fn wait(&self, name: &'static str, timeout: Duration) -> Result<E, PusherError> {
        let mut receiver = {
            let mut channels = self.channels.lock().expect("event pusher channel lock poisoned");
            channels
                .entry(name)
                .or_insert_with(|| broadcast::channel(32).0)
                .subscribe()
        };
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) | Err(_) => Err(PusherError::Timeout),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PusherError {
    #[error("timed out waiting for event")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn listeners_run_in_registration_order() {
        let pusher: EventPusher<u32> = EventPusher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        pusher.register_listener("tick", move |_| order_a.lock().unwrap().push("a"));
        let order_b = Arc::clone(&order);
        pusher.register_listener("tick", move |_| order_b.lock().unwrap().push("b"));

        pusher.push_event("tick", 1);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn listener_receives_pushed_payload() {
        let pusher: EventPusher<u32> = EventPusher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        pusher.register_listener("n", move |v| seen_clone.store(*v as usize, Ordering::SeqCst));
        pusher.push_event("n", 42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[tokio::test]
    async fn wait_resolves_on_next_emission() {
        let pusher: Arc<EventPusher<u32>> = Arc::new(EventPusher::new());
        let waiter = {
            let pusher = Arc::clone(&pusher);
            tokio::spawn(async move { pusher.wait("ack", Duration::from_secs(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        pusher.push_event("ack", 7);
        assert_eq!(waiter.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn wait_times_out_with_no_emission() {
        let pusher: EventPusher<u32> = EventPusher::new();
        let result = pusher.wait("never", Duration::from_millis(20)).await;
        assert_eq!(result, Err(PusherError::Timeout));
    }
}
