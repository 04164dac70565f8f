use std::marker::PhantomData;
use std::sync::Arc;

use fhe_math::rq::{traits::TryConvertFrom, Poly, Representation};
use fhe_traits::{DeserializeParametrized, DeserializeWithContext, FheParametrized, Serialize};
use fhe_util::sample_vec_cbd_f32;
use itertools::{izip, Itertools};
use prost::Message;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::ckks::{CkksParameters, KeySwitchingKey, RelinearizationKey, SecretKey};
use crate::proto::ckks::RelinKeyShare as RelinKeyShareProto;
use crate::{Error, Result};

use super::committee::{check_metadata, collect_shares, Share};
use super::{Aggregate, Committee};

/// Generator of the shares of a party in the relinearization key generation
/// protocol.
///
/// This is the two-round "Protocol 2: RelinKeyGen" detailed in
/// [Multiparty HE from RLWE](https://eprint.iacr.org/2020/304.pdf) (p7). The generator
/// holds the secret key share and the ephemeral secret of the party across
/// the two rounds.
pub struct RelinKeyGenerator<'a> {
    sk_share: &'a SecretKey,
    party_id: usize,
    num_parties: usize,
    crps: Vec<Poly>,
    u: Zeroizing<Poly>,
    s: Zeroizing<Poly>,
}

/// Marker for the shares of the first round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R1;
/// Marker for the aggregation of the shares of the first round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R1Aggregated;
/// Marker for the shares of the second round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R2;

/// A round of the relinearization key generation protocol, identified on
/// the wire by its index.
pub trait Round {
    /// Index of the round in serialized shares.
    const INDEX: u32;
}

impl Round for R1 {
    const INDEX: u32 = 1;
}

impl Round for R1Aggregated {
    const INDEX: u32 = 2;
}

impl Round for R2 {
    const INDEX: u32 = 3;
}

/// A share in the relinearization key generation protocol, at the round `R`.
///
/// Each element holds one polynomial per decomposition digit, over Q ∪ P.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelinKeyShare<R = R1> {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) party_id: usize,
    pub(crate) num_parties: usize,
    pub(crate) h0: Box<[Poly]>,
    pub(crate) h1: Box<[Poly]>,
    _round: PhantomData<R>,
}

impl<'a> RelinKeyGenerator<'a> {
    /// Create a generator for the party `party_id` of the committee, sampling
    /// its ephemeral secret.
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &'a SecretKey,
        committee: &Committee,
        party_id: usize,
        rng: &mut R,
    ) -> Result<Self> {
        committee.check_party(party_id)?;
        let par = &sk_share.par;
        let crps = committee
            .relin_crps(par)?
            .into_iter()
            .map(|crp| crp.poly)
            .collect_vec();
        let ctx_qp = KeySwitchingKey::ctx_qp(par)?;

        let u_coeffs = Zeroizing::new(
            sample_vec_cbd_f32(par.degree(), SecretKey::SK_VARIANCE, rng)
                .map_err(|e| Error::UnspecifiedInput(e.to_string()))?,
        );
        let u = Zeroizing::new(Poly::try_convert_from(
            u_coeffs.as_slice(),
            ctx_qp,
            Representation::Ntt,
        )?);

        Ok(Self {
            sk_share,
            party_id,
            num_parties: committee.num_parties(),
            crps,
            u,
            s: sk_share.poly_at(ctx_qp)?,
        })
    }

    fn par(&self) -> &Arc<CkksParameters> {
        &self.sk_share.par
    }

    fn small<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Poly> {
        let ctx_qp = KeySwitchingKey::ctx_qp(self.par())?;
        Ok(Poly::small(
            ctx_qp,
            Representation::Ntt,
            self.par().variance(),
            rng,
        )?)
    }

    /// Compute the share of the first round:
    /// h0_j = −u_i·a_j + g_j·s_i + e0_j and h1_j = s_i·a_j + e1_j.
    pub fn round_1<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<RelinKeyShare<R1>> {
        let par = self.par();
        let s_0 = self.sk_share.poly_at(&par.ctx[0])?;
        let mut h0 = Vec::with_capacity(self.crps.len());
        let mut h1 = Vec::with_capacity(self.crps.len());
        for (j, a) in self.crps.iter().enumerate() {
            let mut h0_j = KeySwitchingKey::gadget(par, &s_0, j)?;
            h0_j -= &(a * self.u.as_ref());
            h0_j += &self.small(rng)?;
            h0.push(h0_j);

            let mut h1_j = a * self.s.as_ref();
            h1_j += &self.small(rng)?;
            h1.push(h1_j);
        }
        Ok(RelinKeyShare::new(
            par,
            self.party_id,
            self.num_parties,
            h0,
            h1,
        ))
    }

    /// Compute the share of the second round from the aggregated first round:
    /// h0_j = s_i·H0_j + e2_j + (u_i − s_i)·H1_j + e3_j. The aggregated H1
    /// becomes the element c1 of the key and is carried in h1.
    pub fn round_2<R: RngCore + CryptoRng>(
        &self,
        r1: &RelinKeyShare<R1Aggregated>,
        rng: &mut R,
    ) -> Result<RelinKeyShare<R2>> {
        if &r1.par != self.par() {
            return Err(Error::protocol(
                "The first round was aggregated under different parameters",
            ));
        }
        let u_minus_s = Zeroizing::new(self.u.as_ref() - self.s.as_ref());
        let mut h0 = Vec::with_capacity(self.crps.len());
        for (h0_agg, h1_agg) in izip!(r1.h0.iter(), r1.h1.iter()) {
            let mut h0_j = h0_agg * self.s.as_ref();
            h0_j += &self.small(rng)?;
            h0_j += &(h1_agg * u_minus_s.as_ref());
            h0_j += &self.small(rng)?;
            h0.push(h0_j);
        }
        Ok(RelinKeyShare::new(
            self.par(),
            self.party_id,
            self.num_parties,
            h0,
            r1.h1.to_vec(),
        ))
    }
}

impl<R> RelinKeyShare<R> {
    fn new(
        par: &Arc<CkksParameters>,
        party_id: usize,
        num_parties: usize,
        h0: Vec<Poly>,
        h1: Vec<Poly>,
    ) -> Self {
        Self {
            par: par.clone(),
            party_id,
            num_parties,
            h0: h0.into_boxed_slice(),
            h1: h1.into_boxed_slice(),
            _round: PhantomData,
        }
    }

    /// Returns the index of the party which created the share.
    pub fn party_id(&self) -> usize {
        self.party_id
    }
}

impl<R> Share for RelinKeyShare<R> {
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

impl<R> FheParametrized for RelinKeyShare<R> {
    type Parameters = CkksParameters;
}

impl<R: Round> Serialize for RelinKeyShare<R> {
    fn to_bytes(&self) -> Vec<u8> {
        RelinKeyShareProto {
            party_id: self.party_id as u32,
            num_parties: self.num_parties as u32,
            round: R::INDEX,
            h0: self.h0.iter().map(|h| h.to_bytes()).collect(),
            h1: self.h1.iter().map(|h| h.to_bytes()).collect(),
            fingerprint: self.par.fingerprint().to_vec(),
        }
        .encode_to_vec()
    }
}

impl<R: Round> DeserializeParametrized for RelinKeyShare<R> {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: RelinKeyShareProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        if proto.round != R::INDEX {
            return Err(Error::protocol(format!(
                "Expected a share of round {}, got round {}",
                R::INDEX,
                proto.round
            )));
        }
        let (party_id, num_parties) = check_metadata(proto.party_id, proto.num_parties)?;
        if proto.h0.len() != par.digits.len() || proto.h1.len() != par.digits.len() {
            return Err(Error::SerializationError);
        }
        let ctx_qp = KeySwitchingKey::ctx_qp(par)?;
        let decode = |bytes: &Vec<u8>| -> Result<Poly> {
            let poly = Poly::from_bytes(bytes, ctx_qp).map_err(|_| Error::SerializationError)?;
            if poly.representation() != &Representation::Ntt {
                return Err(Error::SerializationError);
            }
            Ok(poly)
        };
        Ok(RelinKeyShare::new(
            par,
            party_id,
            num_parties,
            proto.h0.iter().map(decode).collect::<Result<Vec<_>>>()?,
            proto.h1.iter().map(decode).collect::<Result<Vec<_>>>()?,
        ))
    }
}

impl Aggregate<RelinKeyShare<R1>> for RelinKeyShare<R1Aggregated> {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = RelinKeyShare<R1>>,
    {
        let mut shares = collect_shares(iter)?.into_iter();
        let share = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut h0 = share.h0.into_vec();
        let mut h1 = share.h1.into_vec();
        for sh in shares {
            izip!(h0.iter_mut(), h1.iter_mut(), sh.h0.iter(), sh.h1.iter()).for_each(
                |(h0, h1, h0_i, h1_i)| {
                    *h0 += h0_i;
                    *h1 += h1_i;
                },
            );
        }
        Ok(RelinKeyShare::new(
            &share.par,
            0,
            share.num_parties,
            h0,
            h1,
        ))
    }
}

impl Aggregate<RelinKeyShare<R2>> for RelinearizationKey {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = RelinKeyShare<R2>>,
    {
        let mut shares = collect_shares(iter)?.into_iter();
        let share = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut c0 = share.h0.into_vec();
        for sh in shares {
            if sh.h1 != share.h1 {
                return Err(Error::protocol(
                    "Shares were computed from different first rounds",
                ));
            }
            c0.iter_mut()
                .zip(sh.h0.iter())
                .for_each(|(c0, c0_i)| *c0 += c0_i);
        }

        Ok(RelinearizationKey {
            ksk: Some(KeySwitchingKey {
                par: share.par.clone(),
                method: share.par.keyswitch_method(),
                c0: c0.into_boxed_slice(),
                c1: share.h1,
            }),
            par: share.par,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{RelinKeyGenerator, RelinKeyShare, R1, R1Aggregated, R2};
    use crate::ckks::{CkksParameters, KeyGenerator, RelinearizationKey};
    use crate::mckks::{Aggregate, Committee};
    use crate::{Error, ErrorCategory};
    use fhe_math::rq::{traits::TryConvertFrom, Poly, Representation};
    use fhe_traits::{DeserializeParametrized, Serialize};
    use rand::thread_rng;
    use std::error::Error as StdError;

    #[test]
    fn relinearization_key() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let committee = Committee::random(3)?;
        let sks = (0..3)
            .map(|_| KeyGenerator::new(&par).generate_secret_key(0))
            .collect::<crate::Result<Vec<_>>>()?;
        let generators = sks
            .iter()
            .enumerate()
            .map(|(i, sk)| RelinKeyGenerator::new(sk, &committee, i, &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;

        let r1 = RelinKeyShare::from_shares(
            generators
                .iter()
                .map(|g| g.round_1(&mut rng))
                .collect::<crate::Result<Vec<_>>>()?,
        )?;
        let r2 = generators
            .iter()
            .map(|g| g.round_2(&r1, &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;
        let rk = RelinearizationKey::from_shares(r2.clone())?;
        assert!(rk.is_generated());

        // Relinearizing c2 yields (d0, d1) with d0 + d1·s ≈ c2·s², where s is
        // the sum of the secret key shares.
        let ctx = par.ctx_at_level(0)?;
        let s_coeffs = (0..par.degree())
            .map(|i| sks.iter().map(|sk| sk.coeffs.as_ref().unwrap()[i]).sum::<i64>())
            .collect::<Vec<_>>();
        let s = Poly::try_convert_from(s_coeffs.as_slice(), ctx, Representation::Ntt)?;
        let c2 = Poly::random(ctx, Representation::Ntt, &mut rng);
        let (d0, d1) = rk.relinearizes_poly(&c2)?;
        let mut e = &d1 * &s;
        e += &d0;
        e -= &(&(&c2 * &s) * &s);
        e.change_representation(Representation::PowerBasis);
        assert!(e.infinity_norm_bits() < 30);

        // Missing share of the second round.
        assert_eq!(
            RelinearizationKey::from_shares(r2[..2].to_vec())
                .unwrap_err()
                .category(),
            ErrorCategory::Protocol
        );
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let committee = Committee::random(2)?;
        let sks = (0..2)
            .map(|_| KeyGenerator::new(&par).generate_secret_key(0))
            .collect::<crate::Result<Vec<_>>>()?;
        let generators = sks
            .iter()
            .enumerate()
            .map(|(i, sk)| RelinKeyGenerator::new(sk, &committee, i, &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;

        // Every message of the protocol goes through bytes.
        let r1 = generators
            .iter()
            .map(|g| RelinKeyShare::<R1>::from_bytes(&g.round_1(&mut rng)?.to_bytes(), &par))
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(r1[1].party_id(), 1);
        let r1_aggregated = RelinKeyShare::from_shares(r1.clone())?;
        let r1_restored =
            RelinKeyShare::<R1Aggregated>::from_bytes(&r1_aggregated.to_bytes(), &par)?;
        assert_eq!(r1_restored, r1_aggregated);

        let r2 = generators
            .iter()
            .map(|g| g.round_2(&r1_restored, &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;
        let r2_restored = r2
            .iter()
            .map(|share| RelinKeyShare::<R2>::from_bytes(&share.to_bytes(), &par))
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(r2_restored, r2);
        assert!(RelinearizationKey::from_shares(r2_restored)?.is_generated());

        // A share is only read back at its own round, under its parameters.
        let bytes = r1[0].to_bytes();
        assert_eq!(
            RelinKeyShare::<R2>::from_bytes(&bytes, &par)
                .unwrap_err()
                .category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            RelinKeyShare::<R1>::from_bytes(&bytes, &CkksParameters::default_arc(3, 16))
                .unwrap_err(),
            Error::ContextMismatch
        );
        Ok(())
    }
}
