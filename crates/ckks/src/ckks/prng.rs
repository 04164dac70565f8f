//! Explicit state of the pseudo-random generators.

use rand::{thread_rng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The state of a seeded generator: a seed and a position in its stream.
///
/// Two objects with the same state draw the same randomness, which makes
/// key generation and encryption reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrngState {
    seed: <ChaCha8Rng as SeedableRng>::Seed,
    offset: u128,
}

impl PrngState {
    /// Create a state at the beginning of the stream of `seed`.
    pub fn new(seed: <ChaCha8Rng as SeedableRng>::Seed) -> Self {
        Self { seed, offset: 0 }
    }

    /// Create a state with a seed drawn from the thread generator.
    pub fn random() -> Self {
        let mut seed = <ChaCha8Rng as SeedableRng>::Seed::default();
        thread_rng().fill(&mut seed);
        Self::new(seed)
    }

    /// Create a state at a given position in the stream of `seed`.
    pub fn with_offset(seed: <ChaCha8Rng as SeedableRng>::Seed, offset: u128) -> Self {
        Self { seed, offset }
    }

    /// Returns the seed.
    pub fn seed(&self) -> &<ChaCha8Rng as SeedableRng>::Seed {
        &self.seed
    }

    /// Returns the position in the stream, in 32-bit words.
    pub fn offset(&self) -> u128 {
        self.offset
    }

    /// Returns a generator positioned at this state.
    pub(crate) fn rng(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_word_pos(self.offset);
        rng
    }

    /// Move the state to the current position of `rng`.
    pub(crate) fn advance(&mut self, rng: &ChaCha8Rng) {
        self.offset = rng.get_word_pos();
    }
}

impl Default for PrngState {
    fn default() -> Self {
        Self::random()
    }
}

#[cfg(test)]
mod tests {
    use super::PrngState;
    use rand::RngCore;

    #[test]
    fn reproducible() {
        let mut state = PrngState::new([3u8; 32]);
        let mut rng = state.rng();
        let first = rng.next_u64();
        state.advance(&rng);
        assert_eq!(state.offset(), 2);

        let second = state.rng().next_u64();
        assert_ne!(first, second);
        assert_eq!(PrngState::new([3u8; 32]).rng().next_u64(), first);
        assert_eq!(
            PrngState::with_offset([3u8; 32], 2).rng().next_u64(),
            second
        );
        assert_ne!(PrngState::random(), PrngState::random());
    }
}
