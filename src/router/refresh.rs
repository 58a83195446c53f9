// src/router/refresh.rs
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Single-flight gate for selection refreshes.
///
/// The first caller to `enter` while no refresh is running gets the writer
/// turn. Anyone entering while that turn is held becomes a waiter and is
/// released only once the writer's attempt has finished.
#[derive(Debug)]
pub struct RefreshGate {
    state: Mutex<GateState>,
    completed: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    generation: u64,
}

pub enum Entry<'a> {
    Writer(WriterTurn<'a>),
    Waiter(Waiter),
}

/// Held by the writer for the duration of one refresh. Dropping it, on any
/// path, completes the attempt and wakes the waiters.
pub struct WriterTurn<'a> {
    gate: &'a RefreshGate,
}

pub struct Waiter {
    target: u64,
    rx: watch::Receiver<u64>,
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            state: Mutex::new(GateState::default()),
            completed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Never blocks; the turn is either taken or a waiter is handed back.
    pub fn enter(&self) -> Entry<'_> {
        let mut state = self.lock();
        if state.in_flight {
            return Entry::Waiter(Waiter {
                target: state.generation + 1,
                rx: self.completed.subscribe(),
            });
        }
        state.in_flight = true;
        Entry::Writer(WriterTurn { gate: self })
    }

    /// Number of refresh attempts completed so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

impl Drop for WriterTurn<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.lock();
        state.in_flight = false;
        state.generation += 1;
        self.gate.completed.send_replace(state.generation);
    }
}

impl Waiter {
    pub async fn wait(mut self) {
        let target = self.target;
        // The sender lives as long as the gate, which outlives every waiter.
        let _ = self.rx.wait_for(|generation| *generation >= target).await;
    }
}
