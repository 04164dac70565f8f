use crate::{ParametersError, Result};

/// Configuration of the bootstrapping procedure.
///
/// The coefficient-to-slot and slot-to-coefficient transforms are split into
/// `cts_piece` and `stc_piece` groups of butterfly stages, each group
/// consuming one level. Fewer groups use fewer levels but more rotations.
/// The modular reduction evaluates a Taylor expansion of `taylor_number`
/// terms. In less key mode, the transforms rotate with power-of-two keys
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BootstrappingConfig {
    cts_piece: usize,
    stc_piece: usize,
    taylor_number: usize,
    less_key_mode: bool,
}

impl BootstrappingConfig {
    /// Smallest supported number of Taylor terms.
    pub const MIN_TAYLOR_NUMBER: usize = 6;

    /// Largest supported number of Taylor terms.
    pub const MAX_TAYLOR_NUMBER: usize = 15;

    /// Create a validated configuration.
    pub fn new(
        cts_piece: usize,
        stc_piece: usize,
        taylor_number: usize,
        less_key_mode: bool,
    ) -> Result<Self> {
        if cts_piece == 0 || stc_piece == 0 {
            return Err(ParametersError::InvalidBootstrappingConfig(
                "the transforms need at least one piece".to_string(),
            )
            .into());
        }
        if !(Self::MIN_TAYLOR_NUMBER..=Self::MAX_TAYLOR_NUMBER).contains(&taylor_number) {
            return Err(ParametersError::InvalidBootstrappingConfig(format!(
                "{taylor_number} Taylor terms, expected between {} and {}",
                Self::MIN_TAYLOR_NUMBER,
                Self::MAX_TAYLOR_NUMBER
            ))
            .into());
        }
        Ok(Self {
            cts_piece,
            stc_piece,
            taylor_number,
            less_key_mode,
        })
    }

    /// Number of levels of the coefficient-to-slot transform.
    pub const fn cts_piece(&self) -> usize {
        self.cts_piece
    }

    /// Number of levels of the slot-to-coefficient transform.
    pub const fn stc_piece(&self) -> usize {
        self.stc_piece
    }

    /// Number of terms of the Taylor expansion of the exponential.
    pub const fn taylor_number(&self) -> usize {
        self.taylor_number
    }

    /// Whether the transforms only use power-of-two rotations.
    pub const fn less_key_mode(&self) -> bool {
        self.less_key_mode
    }
}

impl Default for BootstrappingConfig {
    fn default() -> Self {
        Self {
            cts_piece: 3,
            stc_piece: 3,
            taylor_number: 11,
            less_key_mode: false,
        }
    }
}
