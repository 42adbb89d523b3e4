/// Short random ID generator for cells
/// Generates lowercase base-36 tokens like "k3f", "0zq"
/// Widens the token when the namespace around an existing collection gets crowded

use crate::cell::CellId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CHARS: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't',
    'u', 'v', 'w', 'x', 'y', 'z',
];

/// Default token length
pub const DEFAULT_ID_LENGTH: usize = 3;

/// Collisions tolerated at one length before widening
const MAX_ATTEMPTS_PER_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct IdGenerator {
    /// Current token length (starts at 3)
    length: usize,
    rng: StdRng,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_ID_LENGTH)
    }

    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.max(1),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic generator (useful for testing)
    pub fn seeded(seed: u64) -> Self {
        Self {
            length: DEFAULT_ID_LENGTH,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a random token. Not guaranteed unique.
    pub fn generate(&mut self) -> String {
        (0..self.length)
            .map(|_| CHARS[self.rng.random_range(0..CHARS.len())])
            .collect()
    }

    /// Generate a token for which `is_taken` returns false
    pub fn generate_unique(&mut self, is_taken: impl Fn(&str) -> bool) -> CellId {
        loop {
            for _ in 0..MAX_ATTEMPTS_PER_LENGTH {
                let token = self.generate();
                if !is_taken(&token) {
                    return CellId::new(token);
                }
            }
            self.expand();
        }
    }

    /// Expand to the next length
    fn expand(&mut self) {
        self.length += 1;
        tracing::debug!(length = self.length, "widened cell id tokens");
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
