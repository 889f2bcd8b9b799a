use xxhash_rust::xxh3::xxh3_128_with_seed;

const XXH3_SEED: u64 = 0x5a17_c0de_d1e5_7a11;

/// Content digest of an asset's raw bytes.
///
/// 128-bit XXH3 with a fixed seed: identical bytes always map to the same digest. Used purely as a
/// dedup key inside one pipeline run, never as an integrity or security check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest {
    hi: u64,
    lo: u64,
}

impl ContentDigest {
    /// Digest `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        let v = xxh3_128_with_seed(bytes, XXH3_SEED);
        Self {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }

    /// Raw 128-bit value.
    pub fn as_u128(self) -> u128 {
        (u128::from(self.hi) << 64) | u128::from(self.lo)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/digest.rs"]
mod tests;
