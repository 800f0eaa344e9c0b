//! Request id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request id source.
///
/// Ids are unique for the life of the session and survive reconnects;
/// a reply that straggles in after a reconnect can still be recognized
/// (and discarded as late) instead of colliding with a fresh request.
#[derive(Debug)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Next unique id.
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic() {
        let gen = RequestIdGenerator::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert!(b > a);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let gen = Arc::new(RequestIdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gen = gen.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| gen.next_id()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 8000);
    }
}
