use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::JobId;

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Committed(JobId),
}

/// Outcome of reserving an idempotency key (spec.md §4.B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// Key was absent; a PENDING placeholder was inserted for this caller.
    Fresh,
    /// Another request is currently building a job for this key.
    InFlight,
    /// A job already exists for this key.
    Committed(JobId),
}

/// Maps idempotency key -> committed job id or a PENDING sentinel.
/// `reserve`/`commit`/`release` are the only mutators and are each
/// atomic under the registry's own lock, independent of the Job Store's.
#[derive(Default)]
pub struct IdempotencyRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl IdempotencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&self, key: &str) -> Reservation {
        let mut guard = self.entries.lock();
        match guard.get(key) {
            None => {
                guard.insert(key.to_string(), Entry::Pending);
                Reservation::Fresh
            }
            Some(Entry::Pending) => Reservation::InFlight,
            Some(Entry::Committed(id)) => Reservation::Committed(id.clone()),
        }
    }

    /// Precondition: the current entry for `key` is PENDING and the
    /// caller is the request that reserved it.
    pub fn commit(&self, key: &str, job_id: JobId) {
        let mut guard = self.entries.lock();
        debug_assert!(matches!(guard.get(key), Some(Entry::Pending)));
        guard.insert(key.to_string(), Entry::Committed(job_id));
    }

    /// Used on validation/parse failure after a successful reservation.
    pub fn release(&self, key: &str) {
        let mut guard = self.entries.lock();
        if matches!(guard.get(key), Some(Entry::Pending)) {
            guard.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_then_in_flight_then_committed() {
        let reg = IdempotencyRegistry::new();
        assert_eq!(reg.reserve("k"), Reservation::Fresh);
        assert_eq!(reg.reserve("k"), Reservation::InFlight);

        reg.commit("k", JobId::from("job-1"));
        assert_eq!(
            reg.reserve("k"),
            Reservation::Committed(JobId::from("job-1"))
        );
    }

    #[test]
    fn release_clears_a_pending_reservation() {
        let reg = IdempotencyRegistry::new();
        assert_eq!(reg.reserve("k"), Reservation::Fresh);
        reg.release("k");
        // The slot is free again, not stuck at InFlight.
        assert_eq!(reg.reserve("k"), Reservation::Fresh);
    }

    #[test]
    fn release_is_a_no_op_once_committed() {
        let reg = IdempotencyRegistry::new();
        reg.reserve("k");
        reg.commit("k", JobId::from("job-1"));
        reg.release("k");
        assert_eq!(
            reg.reserve("k"),
            Reservation::Committed(JobId::from("job-1"))
        );
    }

    /// Property 4/S5: two concurrent reservations for the same key, only
    /// one can ever observe Fresh.
    #[test]
    fn concurrent_reserve_is_exclusive() {
        let reg = Arc::new(IdempotencyRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                thread::spawn(move || reg.reserve("shared-key"))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let fresh_count = results.iter().filter(|r| **r == Reservation::Fresh).count();
        assert_eq!(fresh_count, 1);
    }
}
