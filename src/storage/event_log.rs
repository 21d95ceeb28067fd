use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded log of operator-facing events, oldest dropped first.
///
/// This is what an operator console polls; diagnostic output goes through
/// the `log` facade instead.
pub struct EventLog {
    inner: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> EventLog {
        EventLog {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        match self.inner.lock() {
            Ok(mut events) => {
                if events.len() == self.capacity {
                    events.pop_front();
                }
                events.push_back(line.into());
            }
            Err(_) => {
                log::error!("Failed to acquire lock on event log");
            }
        }
    }

    /// Snapshot, oldest first
    pub fn recent(&self) -> Vec<String> {
        match self.inner.lock() {
            Ok(events) => events.iter().cloned().collect(),
            Err(_) => {
                log::error!("Failed to acquire lock on event log");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(events) => events.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
