use std::sync::Arc;

use fhe_math::rq::{Context, Poly, Representation};
use fhe_traits::Serialize;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ckks::CkksParameters;
use crate::Result;

/// A polynomial sampled from a random _common reference string_.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CommonRandomPoly {
    pub(crate) poly: Poly,
}

impl CommonRandomPoly {
    /// Generate a new random CRP at the first level.
    pub fn new<R: RngCore + CryptoRng>(par: &Arc<CkksParameters>, rng: &mut R) -> Result<Self> {
        let ctx = par.ctx_at_level(0)?;
        Ok(Self {
            poly: Poly::random(ctx, Representation::Ntt, rng),
        })
    }

    /// Generate a new CRP from a shared deterministic seed.
    pub(crate) fn new_deterministic(
        ctx: &Arc<Context>,
        seed: <ChaCha8Rng as SeedableRng>::Seed,
    ) -> Result<Self> {
        Ok(Self {
            poly: Poly::random_from_seed(ctx, Representation::Ntt, seed),
        })
    }
}

impl Serialize for CommonRandomPoly {
    fn to_bytes(&self) -> Vec<u8> {
        self.poly.to_bytes()
    }
}
