//! Single-flight memoization for async producers.
//!
//! Concurrent calls with the same key share one producer execution. Only
//! successful results are cached; failures are handed to every waiter of
//! that flight and then forgotten, so the next call runs the producer again.
//!
//! Producers run on their own task: dropping a caller never cancels a
//! flight other callers are waiting on.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

/// The producer task ended without handing back a result (it panicked)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("producer ended without a result")]
pub struct FlightAborted;

type Slot<V, E> = Option<Result<V, E>>;

struct Flight<V, E> {
    id: u64,
    rx: watch::Receiver<Slot<V, E>>,
}

struct State<K, V, E> {
    cached: HashMap<K, V>,
    in_flight: HashMap<K, Flight<V, E>>,
    next_flight: u64,
}

enum Lookup<V, E> {
    Hit(V),
    Join(watch::Receiver<Slot<V, E>>),
    Lead {
        id: u64,
        tx: watch::Sender<Slot<V, E>>,
        rx: watch::Receiver<Slot<V, E>>,
    },
}

/// Async result cache with request coalescing, keyed by `K`
pub struct SingleFlight<K, V, E> {
    state: Arc<Mutex<State<K, V, E>>>,
}

impl<K, V, E> Clone for SingleFlight<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V, E> fmt::Debug for SingleFlight<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SingleFlight")
            .field("cached", &state.cached.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                cached: HashMap::new(),
                in_flight: HashMap::new(),
                next_flight: 0,
            })),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<FlightAborted> + 'static,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, join the flight already running
    /// for it, or start `producer` as a new flight.
    ///
    /// A cache hit still yields to the scheduler before returning, so
    /// callers never observe the value within the same poll.
    pub async fn get<F, Fut>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let lookup = {
            let mut state = self.state.lock();
            if let Some(value) = state.cached.get(&key) {
                Lookup::Hit(value.clone())
            } else if let Some(flight) = state.in_flight.get(&key) {
                Lookup::Join(flight.rx.clone())
            } else {
                let id = state.next_flight;
                state.next_flight += 1;
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(
                    key.clone(),
                    Flight {
                        id,
                        rx: rx.clone(),
                    },
                );
                Lookup::Lead { id, tx, rx }
            }
        };

        match lookup {
            Lookup::Hit(value) => {
                tokio::task::yield_now().await;
                Ok(value)
            }
            Lookup::Join(rx) => Self::wait(rx).await,
            Lookup::Lead { id, tx, rx } => {
                let landing = Landing {
                    state: Arc::clone(&self.state),
                    key: Some(key),
                    id,
                };
                let fut = producer();

                tokio::spawn(async move {
                    let mut landing = landing;
                    let result = fut.await;
                    landing.complete(&result);
                    let _ = tx.send(Some(result));
                });

                Self::wait(rx).await
            }
        }
    }

    /// Drop the cached value for `key`.
    ///
    /// A flight already running for `key` is detached: its current waiters
    /// still receive its result, but it will not be cached and new calls
    /// start a fresh flight.
    pub fn evict(&self, key: &K) {
        let mut state = self.state.lock();
        state.cached.remove(key);
        state.in_flight.remove(key);
    }

    /// Drop every cached value and detach every running flight
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.cached.clear();
        state.in_flight.clear();
    }

    /// Check whether a successful result is cached for `key`
    pub fn is_cached(&self, key: &K) -> bool {
        self.state.lock().cached.contains_key(key)
    }

    /// Number of cached values
    pub fn len(&self) -> usize {
        self.state.lock().cached.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn wait(mut rx: watch::Receiver<Slot<V, E>>) -> Result<V, E> {
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => match &*slot {
                Some(result) => result.clone(),
                None => Err(FlightAborted.into()),
            },
            Err(_) => Err(FlightAborted.into()),
        }
    }
}

/// Retires a flight from the in-flight table, even if its task panics
struct Landing<K, V, E>
where
    K: Eq + Hash,
{
    state: Arc<Mutex<State<K, V, E>>>,
    key: Option<K>,
    id: u64,
}

impl<K, V, E> Landing<K, V, E>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Retire the flight and cache a successful result, unless the flight
    /// was detached by an eviction while it ran
    fn complete(&mut self, result: &Result<V, E>) {
        let Some(key) = self.key.take() else {
            return;
        };

        let mut state = self.state.lock();
        if !state.in_flight.get(&key).is_some_and(|f| f.id == self.id) {
            return;
        }

        state.in_flight.remove(&key);
        if let Ok(value) = result {
            state.cached.insert(key, value.clone());
        }
    }
}

impl<K, V, E> Drop for Landing<K, V, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut state = self.state.lock();
            if state.in_flight.get(&key).is_some_and(|f| f.id == self.id) {
                state.in_flight.remove(&key);
            }
        }
    }
}
