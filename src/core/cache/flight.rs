//! Per-key execution coalescing.
//!
//! The first caller for a key becomes the leader and receives a
//! [`FlightGuard`]; later callers become followers and receive a oneshot
//! receiver that yields the leader's result. A guard dropped without
//! completing (leader cancelled or panicked) removes the flight, which closes
//! every follower's receiver so they can retry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

type Waiters<V> = Vec<oneshot::Sender<V>>;

/// Set of in-flight loads keyed by cache key.
#[derive(Debug)]
pub(crate) struct FlightGroup<V> {
    flights: Arc<Mutex<HashMap<String, Waiters<V>>>>,
}

impl<V> Default for FlightGroup<V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Outcome of joining a flight.
pub(crate) enum Role<V> {
    /// This caller must perform the load and complete the guard.
    Leader(FlightGuard<V>),
    /// Another caller is loading; await its result.
    Follower(oneshot::Receiver<V>),
}

impl<V: Clone> FlightGroup<V> {
    /// Join the flight for `key`, starting it if none is in progress.
    pub(crate) fn join(&self, key: &str) -> Role<V> {
        let mut flights = self.flights.lock();
        if let Some(waiters) = flights.get_mut(key) {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Role::Follower(rx);
        }
        flights.insert(key.to_string(), Vec::new());
        Role::Leader(FlightGuard {
            key: key.to_string(),
            flights: Arc::clone(&self.flights),
            done: false,
        })
    }

    /// Number of keys with a load in progress.
    pub(crate) fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

/// Leadership of one flight.
pub(crate) struct FlightGuard<V> {
    key: String,
    flights: Arc<Mutex<HashMap<String, Waiters<V>>>>,
    done: bool,
}

impl<V: Clone> FlightGuard<V> {
    /// End the flight and hand `value` to every follower. Returns the number
    /// of followers that were waiting.
    pub(crate) fn complete(mut self, value: &V) -> usize {
        self.done = true;
        let waiters = self.flights.lock().remove(&self.key).unwrap_or_default();
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(value.clone());
        }
        count
    }
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        if !self.done {
            // dropping the senders wakes followers with RecvError
            self.flights.lock().remove(&self.key);
        }
    }
}
