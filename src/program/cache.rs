//! Program Cache
//!
//! Maps a program hash to its compiled [`Program`], compiling each hash at
//! most once even under concurrent requests.
//!
//! # Single flight
//!
//! A slot is either `Pending` or `Ready`. The first caller for a hash
//! inserts `Pending`, releases the lock and compiles; every other caller for
//! the same hash blocks on the condition variable until the slot changes.
//!
//! - success: the slot becomes `Ready` and all waiters share the `Arc`
//! - failure: the slot is removed and all waiters of that flight see `None`
//! - panic: a guard removes the slot on unwind, so waiters never hang
//!
//! There is no cancellation: a started compile always runs to completion.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use super::Program;

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// `None` when the compile for this hash failed.
    pub program: Option<Arc<Program>>,
    /// This caller ran the compile.
    pub first_instance: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Compiles started.
    pub misses: u64,
    /// Callers that blocked on another caller's compile.
    pub waits: u64,
    pub failures: u64,
    /// Source digest mismatches under the verifying lookup.
    pub collisions: u64,
}

enum Slot {
    /// Compile in flight, tagged with its flight id.
    Pending(u64),
    Ready(Arc<Program>),
}

#[derive(Default)]
struct CacheState {
    slots: FxHashMap<u64, Slot>,
    next_flight: u64,
    stats: CacheStats,
}

/// Outcome of the locked part of a lookup.
enum Claim {
    Ready(Arc<Program>),
    /// The flight this caller waited on failed.
    Failed,
    /// This caller owns a new flight.
    Owner(u64),
}

#[derive(Default)]
pub struct ProgramCache {
    state: Mutex<CacheState>,
    ready: Condvar,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program for `hash`, running `compile` if no program is
    /// cached or in flight.
    pub fn get_or_compile<F>(&self, hash: u64, compile: F) -> CacheLookup
    where
        F: FnOnce() -> Option<Program>,
    {
        match self.claim(hash) {
            Claim::Ready(program) => CacheLookup {
                program: Some(program),
                first_instance: false,
            },
            Claim::Failed => CacheLookup {
                program: None,
                first_instance: false,
            },
            Claim::Owner(flight) => self.run_flight(hash, flight, compile),
        }
    }

    /// Like [`Self::get_or_compile`], but a cached program is only reused
    /// when `source_digest` matches the digest it was built from.
    ///
    /// On a mismatch the hash collided: the program is compiled privately
    /// and not cached.
    pub fn get_or_compile_verified<D, F>(&self, hash: u64, source_digest: D, compile: F) -> CacheLookup
    where
        D: FnOnce() -> Option<u128>,
        F: FnOnce() -> Option<Program>,
    {
        let program = match self.claim(hash) {
            Claim::Owner(flight) => return self.run_flight(hash, flight, compile),
            Claim::Failed => {
                return CacheLookup {
                    program: None,
                    first_instance: false,
                };
            }
            Claim::Ready(program) => program,
        };

        match source_digest() {
            Some(digest) if digest == program.source_digest() => CacheLookup {
                program: Some(program),
                first_instance: false,
            },
            Some(_) => {
                log::warn!("Program hash {hash:016x} collided; compiling an uncached program");
                self.state.lock().stats.collisions += 1;
                CacheLookup {
                    program: compile().map(Arc::new),
                    first_instance: true,
                }
            }
            // sources could not be regenerated, nothing to compare
            None => CacheLookup {
                program: Some(program),
                first_instance: false,
            },
        }
    }

    fn claim(&self, hash: u64) -> Claim {
        let mut state = self.state.lock();
        let mut waited_on = None;
        loop {
            match state.slots.get(&hash) {
                Some(Slot::Ready(program)) => {
                    let program = Arc::clone(program);
                    // waiters were already counted
                    if waited_on.is_none() {
                        state.stats.hits += 1;
                    }
                    return Claim::Ready(program);
                }
                Some(Slot::Pending(flight)) => {
                    let flight = *flight;
                    match waited_on {
                        // a different flight means ours failed and another started
                        Some(ours) if ours != flight => return Claim::Failed,
                        Some(_) => {}
                        None => {
                            state.stats.waits += 1;
                            waited_on = Some(flight);
                        }
                    }
                    self.ready.wait(&mut state);
                }
                None if waited_on.is_some() => return Claim::Failed,
                None => {
                    let flight = state.next_flight;
                    state.next_flight += 1;
                    state.stats.misses += 1;
                    state.slots.insert(hash, Slot::Pending(flight));
                    return Claim::Owner(flight);
                }
            }
        }
    }

    fn run_flight<F>(&self, hash: u64, flight: u64, compile: F) -> CacheLookup
    where
        F: FnOnce() -> Option<Program>,
    {
        let mut guard = FlightGuard {
            cache: self,
            hash,
            flight,
            armed: true,
        };
        let program = compile().map(Arc::new);
        guard.armed = false;

        let mut state = self.state.lock();
        match &program {
            Some(program) => {
                state.slots.insert(hash, Slot::Ready(Arc::clone(program)));
            }
            None => {
                state.slots.remove(&hash);
                state.stats.failures += 1;
            }
        }
        drop(state);
        self.ready.notify_all();

        CacheLookup {
            program,
            first_instance: true,
        }
    }

    /// Cached program for `hash`, without compiling or waiting.
    #[must_use]
    pub fn get(&self, hash: u64) -> Option<Arc<Program>> {
        match self.state.lock().slots.get(&hash) {
            Some(Slot::Ready(program)) => Some(Arc::clone(program)),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, hash: u64) -> bool {
        self.get(hash).is_some()
    }

    /// Removes a ready program. Compiles in flight are left alone.
    pub fn evict(&self, hash: u64) -> Option<Arc<Program>> {
        let mut state = self.state.lock();
        match state.slots.remove(&hash) {
            Some(Slot::Ready(program)) => Some(program),
            Some(pending) => {
                state.slots.insert(hash, pending);
                None
            }
            None => None,
        }
    }

    /// Removes every ready program.
    pub fn clear(&self) {
        self.state
            .lock()
            .slots
            .retain(|_, slot| matches!(slot, Slot::Pending(_)));
    }

    /// Number of ready programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

/// Clears a pending slot if the compiling closure unwinds.
struct FlightGuard<'a> {
    cache: &'a ProgramCache,
    hash: u64,
    flight: u64,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::error!("Compile of program {:016x} panicked", self.hash);
        let mut state = self.cache.state.lock();
        if matches!(state.slots.get(&self.hash), Some(Slot::Pending(f)) if *f == self.flight) {
            state.slots.remove(&self.hash);
        }
        state.stats.failures += 1;
        drop(state);
        self.cache.ready.notify_all();
    }
}
