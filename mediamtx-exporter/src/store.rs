//! Holder for the most recent snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::snapshot::Snapshot;

/// Thread-safe snapshot store.
///
/// Readers get an `Arc` to a complete snapshot; a replace swaps the pointer,
/// so a reader sees either the old or the new snapshot and never a mix.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        *self.current.write() = next;
    }

    /// Current snapshot.
    pub fn read(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }
}

/// Create a shareable store handle.
pub type SharedStore = Arc<SnapshotStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SampleKey, SampleValue};

    fn snapshot_of(n: usize, value: f64) -> Snapshot {
        (0..n)
            .map(|i| (SampleKey::new(format!("m{}", i)), SampleValue::Number(value)))
            .collect()
    }

    #[test]
    fn test_starts_empty() {
        let store = SnapshotStore::new();
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_replace_with_empty() {
        let store = SnapshotStore::new();
        store.replace(snapshot_of(3, 1.0));
        assert_eq!(store.read().len(), 3);

        store.replace(Snapshot::empty());
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_reader_keeps_old_snapshot_after_replace() {
        let store = SnapshotStore::new();
        store.replace(snapshot_of(2, 1.0));

        let before = store.read();
        store.replace(snapshot_of(5, 2.0));

        assert_eq!(before.len(), 2);
        assert_eq!(store.read().len(), 5);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        store.replace(snapshot_of(10, 0.0));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for round in 1..200 {
                    store.replace(snapshot_of(10, round as f64));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = store.read();
                        assert_eq!(snapshot.len(), 10);
                        let first = snapshot.iter().next().unwrap().1.clone();
                        assert!(snapshot.iter().all(|(_, v)| *v == first));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
