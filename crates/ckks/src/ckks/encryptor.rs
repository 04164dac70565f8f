//! Encryption in the CKKS encryption scheme.

use crate::ckks::{
    Ciphertext, CkksParameters, ExecutionOptions, Plaintext, PrngState, PublicKey, SecretKey,
};
use crate::{Error, Result};
use fhe_traits::{FheEncrypter, FheParametrized};
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy)]
enum EncryptionKey<'a> {
    Public(&'a PublicKey),
    Secret(&'a SecretKey),
}

/// Encryptor of plaintexts, under a public key or a secret key.
///
/// Each encryption consumes randomness from the encryptor's [`PrngState`],
/// which can be read and set to reproduce an encryption.
#[derive(Debug, Clone)]
pub struct Encryptor<'a> {
    par: Arc<CkksParameters>,
    key: EncryptionKey<'a>,
    state: PrngState,
    options: ExecutionOptions,
}

impl<'a> Encryptor<'a> {
    /// Create an encryptor for a public key.
    pub fn with_public_key(pk: &'a PublicKey) -> Result<Self> {
        pk.ciphertext()?;
        Ok(Self {
            par: pk.par.clone(),
            key: EncryptionKey::Public(pk),
            state: PrngState::random(),
            options: ExecutionOptions::default(),
        })
    }

    /// Create an encryptor for a secret key.
    pub fn with_secret_key(sk: &'a SecretKey) -> Result<Self> {
        sk.coefficients()?;
        Ok(Self {
            par: sk.par.clone(),
            key: EncryptionKey::Secret(sk),
            state: PrngState::random(),
            options: ExecutionOptions::default(),
        })
    }

    /// Returns the current state of the encryptor.
    pub fn state(&self) -> PrngState {
        self.state
    }

    /// Set the state of the encryptor.
    pub fn set_state(&mut self, state: PrngState) {
        self.state = state;
    }

    /// Set the execution options of the encryptor.
    pub fn set_options(&mut self, options: ExecutionOptions) {
        self.options = options;
    }

    /// Encrypt a plaintext at its level and scale, and advance the state.
    pub fn encrypt(&mut self, pt: &Plaintext) -> Result<Ciphertext> {
        let mut state = self.state;
        let ct = self.encrypt_with_state(pt, &mut state)?;
        self.state = state;
        Ok(ct)
    }

    /// Encrypt a plaintext using and advancing an explicit state, leaving
    /// the state of the encryptor untouched.
    pub fn encrypt_with_state(&self, pt: &Plaintext, state: &mut PrngState) -> Result<Ciphertext> {
        check_plaintext(&self.par, pt)?;
        let storage = self.options.resolve(&[pt.storage])?;
        let mut rng = state.rng();
        let mut ct = match self.key {
            EncryptionKey::Public(pk) => pk.try_encrypt(pt, &mut rng),
            EncryptionKey::Secret(sk) => sk.try_encrypt(pt, &mut rng),
        }?;
        state.advance(&rng);
        ct.storage = storage;
        Ok(ct)
    }
}

impl FheParametrized for Encryptor<'_> {
    type Parameters = CkksParameters;
}

fn check_plaintext(par: &Arc<CkksParameters>, pt: &Plaintext) -> Result<()> {
    if &pt.par != par {
        Err(Error::ContextMismatch)
    } else {
        Ok(())
    }
}

impl FheEncrypter<Plaintext, Ciphertext> for SecretKey {
    type Error = Error;

    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        check_plaintext(&self.par, pt)?;
        let m = Zeroizing::new(pt.to_poly());
        let mut ct = Ciphertext::new(self.encrypt_poly(&m, rng)?, pt.scale, &self.par)?;
        ct.storage = pt.storage;
        Ok(ct)
    }
}

impl FheEncrypter<Plaintext, Ciphertext> for PublicKey {
    type Error = Error;

    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        check_plaintext(&self.par, pt)?;
        let m = Zeroizing::new(pt.to_poly());
        let mut ct = Ciphertext::new(self.encrypt_poly(&m, rng)?, pt.scale, &self.par)?;
        ct.storage = pt.storage;
        Ok(ct)
    }
}
