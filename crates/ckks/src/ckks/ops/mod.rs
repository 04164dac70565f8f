//! Operations over ciphertexts and plaintexts.

mod arithmetic;
mod logic;

pub use arithmetic::ArithmeticOperator;
pub use logic::LogicOperator;

/// Relative tolerance under which two scales are considered equal.
pub(crate) const SCALE_TOLERANCE: f64 = 1e-5;

/// Returns whether two scales agree within the relative tolerance.
pub(crate) fn scales_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCALE_TOLERANCE * a.abs().max(b.abs())
}
