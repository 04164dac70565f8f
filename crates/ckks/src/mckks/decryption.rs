use std::sync::Arc;

use fhe_math::rq::{normal::sample_bigint_normal_vec, traits::TryConvertFrom, Poly, Representation};
use fhe_traits::{DeserializeWithContext, Serialize};
use num_bigint::BigInt;
use prost::Message;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::ckks::{Ciphertext, CkksParameters, Plaintext, SecretKey};
use crate::proto::ckks::DecryptionShare as DecryptionShareProto;
use crate::{Error, Result};

use super::committee::{check_metadata, collect_shares, Share};
use super::{Aggregate, Committee};

/// Variance of the noise smudging a decryption share, as a power of two.
const SMUDGING_VARIANCE_BITS: usize = 20;

/// A party's share in the decryption protocol.
///
/// Each party computes `s_i·c1 + e_i`, where `e_i` is a smudging noise hiding
/// its secret key share. Use the [`Aggregate`] impl to combine the shares of
/// all the parties into a [`Plaintext`].
#[derive(Debug, PartialEq, Clone)]
pub struct DecryptionShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) party_id: usize,
    pub(crate) num_parties: usize,
    /// The ciphertext being decrypted.
    pub(crate) ct: Arc<Ciphertext>,
    pub(crate) h_share: Poly,
}

impl DecryptionShare {
    /// Participate in a new Decryption protocol.
    ///
    /// 1. *Private input*: CKKS secret key share
    /// 2. *Public input*: Ciphertext to decrypt
    /// 3. *Public input*: the committee and the index of the party in it
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        ct: &Arc<Ciphertext>,
        committee: &Committee,
        party_id: usize,
        rng: &mut R,
    ) -> Result<Self> {
        committee.check_party(party_id)?;
        if sk_share.par != ct.par {
            return Err(Error::ContextMismatch);
        }
        if ct.c.len() != 2 {
            return Err(Error::TooManyValues(ct.c.len(), 2));
        }

        let ctx = ct.c[0].ctx();
        let s = sk_share.poly_at(ctx)?;
        let smudging = sample_bigint_normal_vec(
            &(BigInt::from(1u64) << SMUDGING_VARIANCE_BITS),
            sk_share.par.degree(),
            rng,
        );
        let mut e = Zeroizing::new(Poly::try_convert_from(
            smudging.as_slice(),
            ctx,
            Representation::PowerBasis,
        )?);
        e.change_representation(Representation::Ntt);

        let mut h_share = &ct.c[1] * s.as_ref();
        h_share += e.as_ref();

        Ok(Self {
            par: sk_share.par.clone(),
            party_id,
            num_parties: committee.num_parties(),
            ct: ct.clone(),
            h_share,
        })
    }

    /// Returns the index of the party which created the share.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    /// Deserialize a DecryptionShare from bytes with the given parameters and
    /// ciphertext.
    pub fn deserialize(
        bytes: &[u8],
        par: &Arc<CkksParameters>,
        ct: Arc<Ciphertext>,
    ) -> Result<Self> {
        let proto: DecryptionShareProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        if &ct.par != par {
            return Err(Error::ContextMismatch);
        }
        if ct.c.len() != 2 {
            return Err(Error::TooManyValues(ct.c.len(), 2));
        }
        let (party_id, num_parties) = check_metadata(proto.party_id, proto.num_parties)?;
        let h_share =
            Poly::from_bytes(&proto.h, ct.c[0].ctx()).map_err(|_| Error::SerializationError)?;
        if h_share.representation() != &Representation::Ntt {
            return Err(Error::SerializationError);
        }
        Ok(Self {
            par: par.clone(),
            party_id,
            num_parties,
            ct,
            h_share,
        })
    }
}

impl Share for DecryptionShare {
    fn par(&self) -> &Arc<CkksParameters> {
        &self.par
    }

    fn party_id(&self) -> usize {
        self.party_id
    }

    fn num_parties(&self) -> usize {
        self.num_parties
    }
}

impl Serialize for DecryptionShare {
    fn to_bytes(&self) -> Vec<u8> {
        DecryptionShareProto {
            party_id: self.party_id as u32,
            num_parties: self.num_parties as u32,
            h: self.h_share.to_bytes(),
            fingerprint: self.par.fingerprint().to_vec(),
        }
        .encode_to_vec()
    }
}

impl Aggregate<DecryptionShare> for Plaintext {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = DecryptionShare>,
    {
        let mut shares = collect_shares(iter)?.into_iter();
        let share = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut m = share.ct.c[0].clone();
        m += &share.h_share;
        for sh in shares {
            if sh.ct != share.ct {
                return Err(Error::protocol("Shares decrypt different ciphertexts"));
            }
            m += &sh.h_share;
        }
        let mut pt = Plaintext::from_parts(&share.par, m, share.ct.scale, share.ct.level);
        pt.storage = share.ct.storage;
        Ok(pt)
    }
}
