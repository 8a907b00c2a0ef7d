//! # engine::clock
//!
//! **Simulation Clock** — deterministic, time-sliced pseudo-random stream.
//!
//! Wall-clock time is cut into fixed slots counted from [`EPOCH_MS`]. Seeding
//! [`SeededRandom`] with the slot index makes every process that starts within
//! the same slot regenerate identical "historical" state.
//!
//! ```text
//! slot = floor((now - EPOCH) / slot_ms)
//! s'   = (s * 1103515245 + 12345) mod 2^31
//! v    = s' / 2^31              ∈ [0, 1)
//! ```
//!
//! Live ticking does not go through here; it uses `rand`.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

const LCG_A: u64 = 1_103_515_245;
const LCG_C: u64 = 12_345;
const LCG_MASK: u64 = 0x7fff_ffff;
const LCG_MODULUS: f64 = 2_147_483_648.0;

/// Default slot width.
pub const DEFAULT_SLOT_MS: i64 = 5_000;

/// `2025-01-01T00:00:00Z` in milliseconds.
pub const EPOCH_MS: i64 = 1_735_689_600_000;

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(EPOCH_MS).single().unwrap_or_default()
}

/// Index of the slot `now` falls in. Floors toward negative infinity so
/// instants before the epoch still map to stable slots.
pub fn time_slot(now: DateTime<Utc>, slot_ms: i64) -> i64 {
    let slot_ms = slot_ms.max(1);
    (now.timestamp_millis() - EPOCH_MS).div_euclid(slot_ms)
}

// ─── SeededRandom ─────────────────────────────────────────────────────────────

/// Linear congruential generator. Same seed, same sequence, everywhere.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: i64) -> Self {
        Self { state: (seed as u64) & LCG_MASK }
    }

    /// Generator for the slot containing `now`.
    pub fn for_slot(now: DateTime<Utc>, slot_ms: i64) -> Self {
        Self::new(time_slot(now, slot_ms))
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(LCG_A).wrapping_add(LCG_C) & LCG_MASK;
        self.state as f64 / LCG_MODULUS
    }

    /// Uniform in `[min, max)`.
    pub fn between(&mut self, min: f64, max: f64) -> f64 {
        self.next_f64() * (max - min) + min
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform pick. `None` on an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = (self.next_f64() * items.len() as f64) as usize;
        items.get(idx.min(items.len() - 1))
    }

    /// Reproducible id built from four draws.
    pub fn next_id(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        for chunk in bytes.chunks_mut(4) {
            self.next_f64();
            chunk.copy_from_slice(&(self.state as u32).to_le_bytes());
        }
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(42);
        let xs: Vec<f64> = (0..64).map(|_| a.next_f64()).collect();
        let ys: Vec<f64> = (0..64).map(|_| b.next_f64()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn known_first_values() {
        // s1 = 12345, s2 = (12345 * 1103515245 + 12345) mod 2^31
        let mut rng = SeededRandom::new(0);
        assert_eq!(rng.next_f64(), 12_345.0 / LCG_MODULUS);
        let expected = ((12_345u64 * LCG_A + LCG_C) & LCG_MASK) as f64 / LCG_MODULUS;
        assert_eq!(rng.next_f64(), expected);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SeededRandom::new(1);
        let mut b = SeededRandom::new(2);
        assert_ne!(a.next_f64(), b.next_f64());
    }

    #[test]
    fn slot_is_stable_within_window() {
        let start = epoch() + Duration::milliseconds(DEFAULT_SLOT_MS * 1_000);
        assert_eq!(time_slot(start, DEFAULT_SLOT_MS), 1_000);
        assert_eq!(time_slot(start + Duration::milliseconds(4_999), DEFAULT_SLOT_MS), 1_000);
        assert_eq!(time_slot(start + Duration::milliseconds(5_000), DEFAULT_SLOT_MS), 1_001);
        assert_eq!(time_slot(epoch() - Duration::milliseconds(1), DEFAULT_SLOT_MS), -1);
    }

    #[test]
    fn ids_replay_per_slot() {
        let now = epoch() + Duration::hours(3);
        let mut a = SeededRandom::for_slot(now, DEFAULT_SLOT_MS);
        let mut b = SeededRandom::for_slot(now + Duration::milliseconds(10), DEFAULT_SLOT_MS);
        assert_eq!(a.next_id(), b.next_id());
    }

    #[test]
    fn pick_and_between_stay_in_range() {
        let mut rng = SeededRandom::new(7);
        let items = [3, 5, 10, 15, 20];
        for _ in 0..200 {
            assert!(items.contains(rng.pick(&items).unwrap()));
            let v = rng.between(500.0, 5000.0);
            assert!((500.0..5000.0).contains(&v));
        }
        assert!(rng.pick::<u32>(&[]).is_none());
    }
}
