//! Ownership-partitioned store of every tank's latest snapshot.
//!
//! Each key has its own lock, and exactly one `TankWriter` can ever be
//! claimed for it. Readers of one key never contend with writers of another.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::PlantError;
use crate::types::{TankHealth, TankKey, TankState};

#[derive(Debug, Default)]
struct SlotData {
    state: Option<TankState>,
    last_ok: Option<Instant>,
    failed: bool,
}

#[derive(Debug, Default)]
struct Slot {
    data: RwLock<SlotData>,
}

impl Slot {
    fn read<R>(&self, f: impl FnOnce(&SlotData) -> R) -> R {
        let g = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f(&g)
    }

    fn write(&self, f: impl FnOnce(&mut SlotData)) {
        let mut g = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut g);
    }
}

#[derive(Debug, Default)]
pub struct PlantState {
    slots: RwLock<BTreeMap<TankKey, Arc<Slot>>>,
}

/// Exclusive write access to one key. Not cloneable.
#[derive(Debug)]
pub struct TankWriter {
    key: TankKey,
    slot: Arc<Slot>,
}

impl TankWriter {
    pub fn key(&self) -> TankKey {
        self.key
    }

    /// Replace the whole entry with `state` observed at `at`.
    pub fn publish(&self, state: TankState, at: Instant) {
        self.slot.write(|d| {
            d.state = Some(state);
            d.last_ok = Some(at);
            d.failed = false;
        });
    }

    /// Record that the tank's remote could not be resolved.
    pub fn mark_failed(&self) {
        self.slot.write(|d| d.failed = true);
    }
}

impl PlantState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the (unpopulated) entry for `key` and hand out its only writer.
    pub fn register(&self, key: TankKey) -> Result<TankWriter, PlantError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&key) {
            return Err(PlantError::WriterClaimed(key));
        }
        let slot = Arc::new(Slot::default());
        slots.insert(key, slot.clone());
        Ok(TankWriter { key, slot })
    }

    fn slot(&self, key: &TankKey) -> Option<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Latest snapshot; `None` if the key is unknown or not yet populated.
    pub fn get(&self, key: &TankKey) -> Option<TankState> {
        self.slot(key)?.read(|d| d.state)
    }

    pub fn contains(&self, key: &TankKey) -> bool {
        self.slot(key).is_some()
    }

    pub fn keys(&self) -> Vec<TankKey> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Every registered key with its latest snapshot, in key order.
    pub fn snapshot(&self) -> Vec<(TankKey, Option<TankState>)> {
        let slots: Vec<(TankKey, Arc<Slot>)> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, s)| (*k, s.clone()))
            .collect();
        slots
            .into_iter()
            .map(|(k, s)| (k, s.read(|d| d.state)))
            .collect()
    }

    pub fn health(&self, key: &TankKey, now: Instant, stale_after: Duration) -> Option<TankHealth> {
        let slot = self.slot(key)?;
        Some(slot.read(|d| TankHealth::classify(d.failed, d.last_ok, now, stale_after)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rgb, StationId, TankName};

    fn key(tank: TankName) -> TankKey {
        TankKey::new(StationId::new(2).unwrap(), tank)
    }

    fn state(level: f64) -> TankState {
        TankState {
            level,
            flow: 0.1,
            valve_ratio: 0.2,
            color: Rgb { r: 1, g: 2, b: 3 },
        }
    }

    #[test]
    fn entry_is_unpopulated_until_first_publish() {
        let ps = PlantState::new();
        let w = ps.register(key(TankName::Cyan)).unwrap();
        assert!(ps.contains(&key(TankName::Cyan)));
        assert_eq!(ps.get(&key(TankName::Cyan)), None);
        w.publish(state(0.4), Instant::now());
        assert_eq!(ps.get(&key(TankName::Cyan)), Some(state(0.4)));
    }

    #[test]
    fn second_writer_claim_is_rejected() {
        let ps = PlantState::new();
        let _w = ps.register(key(TankName::Mixer)).unwrap();
        match ps.register(key(TankName::Mixer)) {
            Err(PlantError::WriterClaimed(k)) => assert_eq!(k, key(TankName::Mixer)),
            other => panic!("expected WriterClaimed, got {other:?}"),
        }
    }

    #[test]
    fn health_tracks_publish_and_failure() {
        let ps = PlantState::new();
        let t0 = Instant::now();
        let stale = Duration::from_millis(100);
        let w = ps.register(key(TankName::White)).unwrap();
        assert_eq!(ps.health(&key(TankName::White), t0, stale), Some(TankHealth::Stale));
        w.publish(state(0.9), t0);
        assert_eq!(ps.health(&key(TankName::White), t0, stale), Some(TankHealth::Fresh));
        w.mark_failed();
        assert_eq!(ps.health(&key(TankName::White), t0, stale), Some(TankHealth::Failed));
        assert_eq!(ps.health(&key(TankName::Black), t0, stale), None);
    }

    #[test]
    fn snapshot_is_in_key_order() {
        let ps = PlantState::new();
        let _m = ps.register(key(TankName::Mixer)).unwrap();
        let c = ps.register(key(TankName::Cyan)).unwrap();
        c.publish(state(0.3), Instant::now());
        let snap = ps.snapshot();
        assert_eq!(snap[0], (key(TankName::Cyan), Some(state(0.3))));
        assert_eq!(snap[1], (key(TankName::Mixer), None));
    }
}
