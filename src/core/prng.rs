// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for stimulus sampling, where a fixed seed must reproduce the
// exact same sequence on every platform.

/// Source of uniform randomness consumed by the sequence generator.
///
/// Only `next_u64` is required; everything else is derived from it so that a
/// seeded implementation stays bit-for-bit reproducible.
pub trait RandomSource {
    fn next_u64(&mut self) -> u64;

    /// Uniform draw in [0,1).
    #[inline]
    fn next_f64_01(&mut self) -> f64 {
        // 53 high bits -> exact f64 mantissa.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform draw in [low, high). Returns `low` for an empty range.
    #[inline]
    fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        low + (self.next_u64() % span) as usize
    }

    /// Bernoulli draw. `p <= 0` never fires and `p >= 1` always fires.
    #[inline]
    fn gen_bool(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next_f64_01() < p
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        (**self).next_u64()
    }
}

const ZERO_STATE_REPLACEMENT: u64 = 0x9E3779B97F4A7C15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 {
            ZERO_STATE_REPLACEMENT
        } else {
            seed
        };
        Self { state: seed }
    }

    /// Unseeded generator for sessions that do not need to be reproduced.
    #[cfg(feature = "std")]
    pub fn from_time() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(ZERO_STATE_REPLACEMENT);
        Self::new(splitmix64(nanos))
    }

    /// Derive an independent child stream.
    ///
    /// Does not advance `self`, so forking block `k` always yields the same
    /// child no matter how many other blocks were forked first.
    pub fn fork(&self, stream: u64) -> Self {
        let mixed = splitmix64(self.state ^ splitmix64(stream.wrapping_add(1)));
        Self::new(mixed)
    }

    pub fn state(&self) -> u64 {
        self.state
    }
}

impl RandomSource for Prng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
