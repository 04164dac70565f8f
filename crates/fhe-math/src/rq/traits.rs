//! Traits used for the polynomial ring.

use super::{Context, Representation};
use std::sync::Arc;

/// Conversions.
///
/// We unfortunately cannot use the `TryFrom` trait from std::convert because
/// we need to specify additional parameters, and if we try to redefine a
/// `TryFrom` trait with these additional parameters, we get a conflict with
/// the existing `TryFrom` trait.
pub trait TryConvertFrom<T>
where
    Self: Sized,
{
    /// Attempt to convert the `value` into a polynomial with a specific
    /// context and under a specific representation.
    fn try_convert_from<R>(value: T, ctx: &Arc<Context>, representation: R) -> crate::Result<Self>
    where
        R: Into<Option<Representation>>;
}
