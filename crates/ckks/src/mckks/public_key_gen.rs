use std::sync::Arc;

use fhe_math::rq::{Poly, Representation};
use fhe_traits::{DeserializeParametrized, DeserializeWithContext, FheParametrized, Serialize};
use prost::Message;
use rand::{CryptoRng, RngCore};

use crate::ckks::{Ciphertext, CkksParameters, PublicKey, SecretKey};
use crate::proto::ckks::PublicKeyShare as PublicKeyShareProto;
use crate::{Error, Result};

use super::committee::{check_metadata, collect_shares, Share};
use super::{Aggregate, CommonRandomPoly, Committee};

/// A party's share in the public key generation protocol.
///
/// Each party uses the `PublicKeyShare` to generate their share of the public
/// key and participate in the "Protocol 1: EncKeyGen", as detailed in
/// [Multiparty HE from RLWE](https://eprint.iacr.org/2020/304.pdf) (p6). Use the
/// [`Aggregate`] impl to combine the shares into a [`PublicKey`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicKeyShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) party_id: usize,
    pub(crate) num_parties: usize,
    pub(crate) crp: CommonRandomPoly,
    pub(crate) p0_share: Poly,
}

impl PublicKeyShare {
    /// Participate in a new EncKeyGen protocol.
    ///
    /// 1. *Private input*: CKKS secret key share
    /// 2. *Public input*: the committee and the index of the party in it
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        committee: &Committee,
        party_id: usize,
        rng: &mut R,
    ) -> Result<Self> {
        committee.check_party(party_id)?;
        let par = sk_share.par.clone();
        let crp = committee.public_key_crp(&par)?;
        let ctx = par.ctx_at_level(0)?;
        let s = sk_share.poly_at(ctx)?;

        // p0_i = -a·s_i + e_i
        let mut p0_share = Poly::small(ctx, Representation::Ntt, par.variance(), rng)?;
        p0_share -= &(&crp.poly * s.as_ref());

        Ok(Self {
            par,
            party_id,
            num_parties: committee.num_parties(),
            crp,
            p0_share,
        })
    }
}

impl Share for PublicKeyShare {
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

impl Aggregate<PublicKeyShare> for PublicKey {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = PublicKeyShare>,
    {
        let mut shares = collect_shares(iter)?.into_iter();
        let share = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut p0 = share.p0_share;
        for sh in shares {
            if sh.crp != share.crp {
                return Err(Error::protocol("Shares use different common random polynomials"));
            }
            p0 += &sh.p0_share;
        }

        Ok(PublicKey {
            c: Some(Ciphertext::new(vec![p0, share.crp.poly], 1.0, &share.par)?),
            par: share.par,
        })
    }
}

impl FheParametrized for PublicKeyShare {
    type Parameters = CkksParameters;
}

impl Serialize for PublicKeyShare {
    fn to_bytes(&self) -> Vec<u8> {
        PublicKeyShareProto {
            party_id: self.party_id as u32,
            num_parties: self.num_parties as u32,
            p0_share: self.p0_share.to_bytes(),
            crp: self.crp.to_bytes(),
            fingerprint: self.par.fingerprint().to_vec(),
        }
        .encode_to_vec()
    }
}

impl DeserializeParametrized for PublicKeyShare {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: PublicKeyShareProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        let (party_id, num_parties) = check_metadata(proto.party_id, proto.num_parties)?;
        let ctx = par.ctx_at_level(0)?;
        let decode = |bytes: &[u8]| -> Result<Poly> {
            let poly = Poly::from_bytes(bytes, ctx).map_err(|_| Error::SerializationError)?;
            if poly.representation() != &Representation::Ntt {
                return Err(Error::SerializationError);
            }
            Ok(poly)
        };
        Ok(Self {
            par: par.clone(),
            party_id,
            num_parties,
            crp: CommonRandomPoly {
                poly: decode(&proto.crp)?,
            },
            p0_share: decode(&proto.p0_share)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PublicKeyShare;
    use crate::ckks::{CkksParameters, Encoder, Encryptor, KeyGenerator, PublicKey};
    use crate::mckks::{Aggregate, Committee};
    use crate::proto::ckks::PublicKeyShare as PublicKeyShareProto;
    use crate::{Error, ErrorCategory};
    use fhe_traits::{DeserializeParametrized, Serialize};
    use prost::Message;
    use rand::thread_rng;
    use std::error::Error as StdError;

    const NUM_PARTIES: usize = 5;

    #[test]
    // Encryptions under the aggregated key are checked against a threshold
    // decryption in `decryption`.
    fn protocol_creates_valid_pk() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        for par in [
            CkksParameters::default_arc(1, 16),
            CkksParameters::default_arc(3, 16),
        ] {
            let committee = Committee::random(NUM_PARTIES)?;
            let shares = (0..NUM_PARTIES)
                .map(|i| {
                    let sk = KeyGenerator::new(&par).generate_secret_key(0)?;
                    PublicKeyShare::new(&sk, &committee, i, &mut rng)
                })
                .collect::<crate::Result<Vec<_>>>()?;
            let pk = PublicKey::from_shares(shares)?;
            assert!(pk.is_generated());

            let encoder = Encoder::new(&par);
            let mut encryptor = Encryptor::with_public_key(&pk)?;
            for level in 0..=par.max_level() {
                let pt = encoder.encode(&[1.0, 2.0], par.scale(), level)?;
                assert_eq!(encryptor.encrypt(&pt)?.level(), level);
            }
        }
        Ok(())
    }

    #[test]
    fn invalid_shares() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(1, 16);
        let committee = Committee::random(3)?;
        let sk = KeyGenerator::new(&par).generate_secret_key(0)?;
        assert_eq!(
            PublicKeyShare::new(&sk, &committee, 3, &mut rng)
                .unwrap_err()
                .category(),
            ErrorCategory::Protocol
        );

        let share = |i| PublicKeyShare::new(&sk, &committee, i, &mut thread_rng());
        let missing = vec![share(0)?, share(1)?];
        assert_eq!(
            PublicKey::from_shares(missing).unwrap_err().category(),
            ErrorCategory::Protocol
        );
        let duplicate = vec![share(0)?, share(1)?, share(1)?];
        assert_eq!(
            PublicKey::from_shares(duplicate).unwrap_err(),
            crate::Error::duplicate_party(1)
        );
        assert!(PublicKey::from_shares(Vec::<PublicKeyShare>::new()).is_err());

        let other = Committee::random(3)?;
        let foreign = vec![
            share(0)?,
            share(1)?,
            PublicKeyShare::new(&sk, &other, 2, &mut rng)?,
        ];
        assert_eq!(
            PublicKey::from_shares(foreign).unwrap_err().category(),
            ErrorCategory::Protocol
        );
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let committee = Committee::random(3)?;
        let sks = (0..3)
            .map(|_| KeyGenerator::new(&par).generate_secret_key(0))
            .collect::<crate::Result<Vec<_>>>()?;
        let shares = sks
            .iter()
            .enumerate()
            .map(|(i, sk)| PublicKeyShare::new(sk, &committee, i, &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;

        let restored = shares
            .iter()
            .map(|share| PublicKeyShare::from_bytes(&share.to_bytes(), &par))
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(restored, shares);
        assert_eq!(
            PublicKey::from_shares(restored)?,
            PublicKey::from_shares(shares.clone())?
        );

        let bytes = shares[2].to_bytes();
        assert_eq!(
            PublicKeyShare::from_bytes(&bytes, &CkksParameters::default_arc(3, 16)).unwrap_err(),
            Error::ContextMismatch
        );
        let mut proto = PublicKeyShareProto::decode(bytes.as_slice())?;
        proto.num_parties = 1;
        proto.party_id = 0;
        assert_eq!(
            PublicKeyShare::from_bytes(&proto.encode_to_vec(), &par)
                .unwrap_err()
                .category(),
            ErrorCategory::Protocol
        );
        Ok(())
    }
}
