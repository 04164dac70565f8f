//! Implementation of serialization and deserialization.

use super::{traits::TryConvertFrom, Context, Poly, Representation};
use crate::{proto::rq::Representation as RepresentationProto, proto::rq::Rq, Error};
use fhe_traits::{DeserializeWithContext, Serialize};
use ndarray::Array2;
use prost::Message;
use std::sync::Arc;

impl From<&Poly> for Rq {
    fn from(p: &Poly) -> Self {
        let representation = match p.representation {
            Representation::PowerBasis => RepresentationProto::Powerbasis,
            Representation::Ntt => RepresentationProto::Ntt,
        };
        Rq {
            representation: representation as i32,
            degree: p.ctx.degree as u32,
            moduli: p.ctx.moduli.to_vec(),
            coefficients: p.coefficients.iter().copied().collect(),
        }
    }
}

impl TryConvertFrom<&Rq> for Poly {
    fn try_convert_from<R>(value: &Rq, ctx: &Arc<Context>, representation: R) -> crate::Result<Self>
    where
        R: Into<Option<Representation>>,
    {
        let repr = match RepresentationProto::try_from(value.representation) {
            Ok(RepresentationProto::Powerbasis) => Representation::PowerBasis,
            Ok(RepresentationProto::Ntt) => Representation::Ntt,
            _ => {
                return Err(Error::Serialization(
                    "Unknown representation".to_string(),
                ))
            }
        };
        if let Some(expected) = representation.into() {
            if expected != repr {
                return Err(Error::IncorrectRepresentation(repr, expected));
            }
        }
        if value.degree as usize != ctx.degree || value.moduli.as_slice() != ctx.moduli() {
            return Err(Error::Serialization(
                "The polynomial does not belong to this context".to_string(),
            ));
        }
        let coefficients =
            Array2::from_shape_vec((ctx.q.len(), ctx.degree), value.coefficients.clone())
                .map_err(|_| Error::Serialization("Invalid number of coefficients".to_string()))?;
        Poly::try_convert_from(coefficients, ctx, repr)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Serialize for Poly {
    fn to_bytes(&self) -> Vec<u8> {
        Rq::from(self).encode_to_vec()
    }
}

impl DeserializeWithContext for Poly {
    type Error = Error;
    type Context = Context;

    fn from_bytes(bytes: &[u8], ctx: &Arc<Context>) -> Result<Self, Self::Error> {
        let rq = Rq::decode(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        Poly::try_convert_from(&rq, ctx, None)
    }
}
