//! Seeded Lehmer (Park–Miller minimal standard) generator
//!
//! Every stochastic decision in the engine draws from this source so a run is
//! fully reproducible from its seed. Not cryptographic.

use rand::RngCore;
use serde::{Deserialize, Serialize};

const MULTIPLIER: u64 = 16807;
const MODULUS: u64 = 2_147_483_647; // 2^31 - 1

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkMiller {
    state: u64,
    draws: u64,
}

impl ParkMiller {
    pub fn new(seed: u64) -> Self {
        let mut state = seed % MODULUS;
        if state == 0 {
            state = MODULUS - 1;
        }
        Self { state, draws: 0 }
    }

    /// Advance the generator; returns the new state in `[1, 2^31 - 2]`
    pub fn next(&mut self) -> u64 {
        self.state = (self.state * MULTIPLIER) % MODULUS;
        self.draws += 1;
        self.state
    }

    /// Uniform draw in `[0, 1)`
    pub fn uniform(&mut self) -> f64 {
        (self.next() - 1) as f64 / (MODULUS - 1) as f64
    }

    /// Standard normal draw via Box–Muller
    pub fn normal(&mut self) -> f64 {
        // 1 - u keeps the log argument in (0, 1]
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Roulette-wheel selection over cumulative weights
    ///
    /// Negative weights count as zero. Falls back to the last item when
    /// floating-point accumulation never crosses the drawn point.
    pub fn pick_weighted<'a, T>(&mut self, items: &'a [T], weights: &[f64]) -> Option<&'a T> {
        let last = items.last()?;
        let total: f64 = weights.iter().take(items.len()).map(|w| w.max(0.0)).sum();
        let point = self.uniform() * total;

        let mut cumulative = 0.0;
        for (item, weight) in items.iter().zip(weights) {
            cumulative += weight.max(0.0);
            if point < cumulative {
                return Some(item);
            }
        }
        Some(last)
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    /// Number of times the generator has been advanced
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl RngCore for ParkMiller {
    fn next_u32(&mut self) -> u32 {
        // 31 significant bits per step; stitch two steps for full width
        let hi = self.next() as u32;
        let lo = self.next() as u32;
        (hi << 16) ^ lo
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_minimal_standard_sequence() {
        // Park & Miller's published check: seed 1 -> 16807 -> 282475249
        let mut rng = ParkMiller::new(1);
        assert_eq!(rng.next(), 16807);
        assert_eq!(rng.next(), 282_475_249);
        assert_eq!(rng.next(), 1_622_650_073);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = ParkMiller::new(0);
        assert_ne!(rng.next(), 0);
        let mut rng = ParkMiller::new(MODULUS);
        assert_ne!(rng.next(), 0);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ParkMiller::new(42);
        let mut b = ParkMiller::new(42);
        for _ in 0..1000 {
            assert_eq!(a.uniform().to_bits(), b.uniform().to_bits());
        }
        assert_eq!(a.normal().to_bits(), b.normal().to_bits());
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = ParkMiller::new(7);
        for _ in 0..10_000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_normal_is_roughly_standard() {
        let mut rng = ParkMiller::new(2024);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.normal()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "variance {}", var);
    }

    #[test]
    fn test_pick_weighted() {
        let mut rng = ParkMiller::new(9);
        let items = ["a", "b", "c"];
        assert_eq!(rng.pick_weighted(&items, &[0.0, 1.0, 0.0]), Some(&"b"));
        let empty: [&str; 0] = [];
        assert_eq!(rng.pick_weighted(&empty, &[]), None);

        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let picked = rng.pick_weighted(&items, &[1.0, 2.0, 1.0]).unwrap();
            let idx = items.iter().position(|i| i == picked).unwrap();
            counts[idx] += 1;
        }
        assert!(counts[1] > counts[0]);
        assert!(counts[1] > counts[2]);
    }

    #[test]
    fn test_pick_weighted_all_zero_falls_back_to_last() {
        let mut rng = ParkMiller::new(3);
        let items = [1, 2, 3];
        assert_eq!(rng.pick_weighted(&items, &[0.0, 0.0, 0.0]), Some(&3));
    }

    #[test]
    fn test_rng_core_integration() {
        let mut rng = ParkMiller::new(11);
        let x: f64 = rng.gen_range(0.0..1.0);
        assert!((0.0..1.0).contains(&x));
        let mut buf = [0u8; 7];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|b| *b != 0));
    }
}
