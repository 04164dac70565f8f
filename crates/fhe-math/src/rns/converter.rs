//! Fast base conversion between two RNS bases.

use super::RnsContext;
use crate::{Error, Result};
use itertools::izip;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use num_traits::ToPrimitive;
use rayon::prelude::*;
use std::sync::Arc;

/// Converter from one RNS basis Q = q_0 ... q_{k-1} to another basis
/// P = p_0 ... p_{l-1}.
///
/// The conversion is centered: a value x in [0, Q) is mapped to the residues
/// of its representative in [-Q/2, Q/2).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseConverter {
    from: Arc<RnsContext>,
    to: Arc<RnsContext>,
    /// (Q / q_i) mod p_j, indexed by [j][i].
    q_star_mod_p: Vec<Vec<u64>>,
    /// Q mod p_j.
    q_mod_p: Vec<u64>,
    q_inv_f64: Vec<f64>,
}

impl BaseConverter {
    /// Create a base converter between two RNS contexts.
    pub fn new(from: &Arc<RnsContext>, to: &Arc<RnsContext>) -> Result<Self> {
        let mut q_star_mod_p = Vec::with_capacity(to.moduli().len());
        let mut q_mod_p = Vec::with_capacity(to.moduli().len());
        for pj in to.moduli() {
            let row = (0..from.moduli().len())
                .map(|i| {
                    from.get_q_star(i)
                        .and_then(|q_star_i| (q_star_i % pj).to_u64())
                        .ok_or_else(|| Error::Default("Invalid RNS context".to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            q_star_mod_p.push(row);
            q_mod_p.push(
                (from.modulus() % pj)
                    .to_u64()
                    .ok_or_else(|| Error::Default("Invalid RNS context".to_string()))?,
            );
        }
        let q_inv_f64 = from.moduli().iter().map(|qi| 1.0 / (*qi as f64)).collect();

        Ok(Self {
            from: from.clone(),
            to: to.clone(),
            q_star_mod_p,
            q_mod_p,
            q_inv_f64,
        })
    }

    /// Returns the source context.
    pub fn from_context(&self) -> &Arc<RnsContext> {
        &self.from
    }

    /// Returns the target context.
    pub fn to_context(&self) -> &Arc<RnsContext> {
        &self.to
    }

    /// Convert a single set of residues.
    pub fn convert_column(&self, x: ArrayView1<u64>) -> Vec<u64> {
        debug_assert_eq!(x.len(), self.from.moduli().len());

        let (q_tilde, q_tilde_shoup) = self.from.q_tilde();
        let y = izip!(
            x.iter(),
            self.from.moduli_operators(),
            q_tilde,
            q_tilde_shoup
        )
        .map(|(xi, qi, ti, ti_shoup)| qi.mul_shoup(*xi, *ti, *ti_shoup))
        .collect::<Vec<_>>();

        // v = round(sum y_i / q_i) is the number of times Q was added when
        // lifting, up to the choice of the centered representative.
        let v = y
            .iter()
            .zip(&self.q_inv_f64)
            .map(|(yi, qi_inv)| *yi as f64 * qi_inv)
            .sum::<f64>()
            .round() as u64;

        izip!(
            self.to.moduli_operators(),
            &self.q_star_mod_p,
            &self.q_mod_p
        )
        .map(|(pj, row, q_mod_pj)| {
            let sum = y.iter().zip(row).fold(0u64, |acc, (yi, cij)| {
                pj.add(acc, pj.mul(pj.reduce(*yi), *cij))
            });
            pj.sub(sum, pj.mul(pj.reduce(v), *q_mod_pj))
        })
        .collect()
    }

    /// Convert a matrix of residues, one row per modulus of the source
    /// context, into a matrix with one row per modulus of the target context.
    pub fn convert(&self, x: ArrayView2<u64>) -> Array2<u64> {
        debug_assert_eq!(x.nrows(), self.from.moduli().len());

        let degree = x.ncols();
        let columns = (0..degree)
            .into_par_iter()
            .map(|k| self.convert_column(x.index_axis(Axis(1), k)))
            .collect::<Vec<_>>();

        let mut out = Array2::zeros((self.to.moduli().len(), degree));
        for (k, column) in columns.iter().enumerate() {
            for (j, value) in column.iter().enumerate() {
                out[[j, k]] = *value;
            }
        }
        out
    }
}
