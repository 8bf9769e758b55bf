// ABOUTME: The offline and pending command FIFOs that back the connection engine
// ABOUTME: Backing storage is replaced with a fresh VecDeque once a queue drains empty

use crate::command::Command;
use std::collections::VecDeque;

/// A FIFO of queued `Command`s. Used both for the offline queue (commands
/// submitted before `ready`) and the pending queue (commands sent, awaiting
/// their reply) per §4.3 — same storage shape, different draining rules at
/// the call site.
#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        CommandQueue {
            inner: VecDeque::new(),
        }
    }

    pub fn push(&mut self, command: Command) {
        self.inner.push_back(command);
    }

    /// Pops the oldest command. When this empties the queue, the backing
    /// `VecDeque` is replaced with a fresh, zero-capacity one so a long-lived
    /// connection doesn't keep a high-water-mark allocation alive forever.
    pub fn shift(&mut self) -> Option<Command> {
        let command = self.inner.pop_front();
        if self.inner.is_empty() && self.inner.capacity() > 0 {
            self.inner = VecDeque::new();
        }
        command
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drains every queued command, handing each to `f`. Used when tearing
    /// down a connection: every offline/pending command is failed with the
    /// same `RedisError::ConnectionGone`.
    pub fn drain(&mut self, mut f: impl FnMut(Command)) {
        while let Some(command) = self.inner.pop_front() {
            f(command);
        }
        self.inner = VecDeque::new();
    }
}
