//! Key generation for the CKKS encryption scheme.

use crate::ckks::{
    CkksParameters, GaloisKey, PrngState, PublicKey, RelinearizationKey, SecretKey,
};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Generator of the keys of the CKKS encryption scheme.
///
/// The randomness is drawn from an explicit [`PrngState`], so that a
/// generator seeded identically produces identical keys.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    par: Arc<CkksParameters>,
    state: PrngState,
}

impl KeyGenerator {
    /// Create a key generator with a random state.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self::with_state(par, PrngState::random())
    }

    /// Create a key generator starting from `state`.
    pub fn with_state(par: &Arc<CkksParameters>, state: PrngState) -> Self {
        Self {
            par: par.clone(),
            state,
        }
    }

    /// Returns the current state of the generator.
    pub fn state(&self) -> PrngState {
        self.state
    }

    /// Set the state of the generator.
    pub fn set_state(&mut self, state: PrngState) {
        self.state = state;
    }

    fn check_parameters(&self, sk: &SecretKey) -> Result<()> {
        if sk.par != self.par {
            Err(Error::ContextMismatch)
        } else {
            Ok(())
        }
    }

    /// Generate a ternary secret key. A `hamming_weight` of 0 samples a dense
    /// key, otherwise exactly `hamming_weight` coefficients are non-zero.
    pub fn generate_secret_key(&mut self, hamming_weight: usize) -> Result<SecretKey> {
        let mut rng = self.state.rng();
        let sk = SecretKey::random(&self.par, hamming_weight, &mut rng)?;
        self.state.advance(&rng);
        debug!(hamming_weight, "generated secret key");
        Ok(sk)
    }

    /// Generate a public key for a secret key.
    pub fn generate_public_key(&mut self, sk: &SecretKey) -> Result<PublicKey> {
        self.check_parameters(sk)?;
        let mut rng = self.state.rng();
        let pk = PublicKey::from_secret_key(sk, &mut rng)?;
        self.state.advance(&rng);
        debug!("generated public key");
        Ok(pk)
    }

    /// Generate a relinearization key for a secret key.
    pub fn generate_relin_key(&mut self, sk: &SecretKey) -> Result<RelinearizationKey> {
        self.check_parameters(sk)?;
        let mut rng = self.state.rng();
        let rk = RelinearizationKey::from_secret_key(sk, &mut rng)?;
        self.state.advance(&rng);
        debug!(method = %self.par.keyswitch_method(), "generated relinearization key");
        Ok(rk)
    }

    /// Generate the keys of a Galois key for a secret key. The supported
    /// rotations are those chosen when the Galois key was created.
    pub fn generate_galois_key(&mut self, sk: &SecretKey, gk: &mut GaloisKey) -> Result<()> {
        self.check_parameters(sk)?;
        if gk.par != self.par {
            return Err(Error::ContextMismatch);
        }
        let mut rng = self.state.rng();
        gk.from_secret_key(sk, &mut rng)?;
        self.state.advance(&rng);
        debug!(
            keys = gk.keys.len(),
            method = %self.par.keyswitch_method(),
            "generated Galois key"
        );
        Ok(())
    }
}
