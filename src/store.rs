use crate::detection::{DetectionSet, Geometry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Latest detection set of a session. No history is kept; every write
/// replaces the previous value.
#[derive(Clone)]
pub struct DetectionStore {
    sender: Arc<watch::Sender<DetectionSet>>,
    updates: Arc<AtomicU64>,
}

impl DetectionStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(DetectionSet::empty());
        Self {
            sender: Arc::new(sender),
            updates: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn latest(&self) -> DetectionSet {
        self.sender.borrow().clone()
    }

    pub fn set(&self, detections: DetectionSet) {
        self.sender.send_replace(detections);
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.set(DetectionSet::empty());
    }

    /// At least one hand is in the latest set
    pub fn hand_presence(&self) -> bool {
        self.sender
            .borrow()
            .iter()
            .any(|d| matches!(&d.geometry, Geometry::Landmarks { points } if !points.is_empty()))
    }

    /// Number of writes since creation
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Watch for changes to the latest set
    pub fn subscribe(&self) -> watch::Receiver<DetectionSet> {
        self.sender.subscribe()
    }
}

impl Default for DetectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DetectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionStore")
            .field("len", &self.sender.borrow().len())
            .field("updates", &self.updates())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, Category, Detection, Landmark};

    #[test]
    fn test_store_replaces_wholesale() {
        let store = DetectionStore::new();
        assert!(store.latest().is_empty());

        let set = DetectionSet::new(vec![Detection::boxed(
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            vec![Category::new("cup", 0.9)],
        )]);
        store.set(set.clone());
        assert!(store.latest().ptr_eq(&set));

        store.clear();
        assert!(store.latest().is_empty());
        assert_eq!(store.updates(), 2);
    }

    #[test]
    fn test_hand_presence() {
        let store = DetectionStore::new();
        assert!(!store.hand_presence());

        store.set(DetectionSet::new(vec![Detection::landmarks(
            vec![Landmark::new(0.5, 0.5); 21],
            Vec::new(),
        )]));
        assert!(store.hand_presence());

        store.clear();
        assert!(!store.hand_presence());
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_value() {
        let store = DetectionStore::new();
        let mut rx = store.subscribe();

        store.set(DetectionSet::new(vec![Detection::landmarks(
            vec![Landmark::new(0.1, 0.1)],
            Vec::new(),
        )]));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
