use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failures, so that callers can react without matching
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid or contradictory parameters.
    Configuration,
    /// An operation was called on objects in an unsuitable state.
    Precondition,
    /// A caller-provided buffer or resource is insufficient.
    Resource,
    /// A multiparty protocol was not followed.
    Protocol,
    /// Malformed or foreign serialized data.
    Serialization,
    /// An error bubbled up from the polynomial arithmetic.
    Math,
}

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// Indicates that an error in the underlying mathematical library was
    /// encountered.
    #[error("{0}")]
    MathError(fhe_math::Error),

    /// Indicates a serialization error.
    #[error("Serialization error")]
    SerializationError,

    /// Indicates that too many values were provided.
    #[error("Too many values provided: {0} exceeds limit {1}")]
    TooManyValues(usize, usize),

    /// Indicates that too few values were provided.
    #[error("Too few values provided: {0} is below limit {1}")]
    TooFewValues(usize, usize),

    /// Indicates that an input is invalid.
    #[error("{0}")]
    UnspecifiedInput(String),

    /// Indicates a mismatch in the encodings.
    #[error("Encoding mismatch: found {0}, expected {1}")]
    EncodingMismatch(String, String),

    /// Indicates a parameter error.
    #[error("{0}")]
    ParametersError(ParametersError),

    /// Indicates that a key was used before being generated.
    #[error("The {0} has not been generated")]
    KeyNotGenerated(String),

    /// Indicates that two operands have incompatible scales.
    #[error("Scale mismatch: {0} and {1} differ")]
    ScaleMismatch(String, String),

    /// Indicates that a rotation step is not supported by a Galois key.
    #[error("The Galois key does not support a rotation by {0} slots")]
    MissingRotation(i64),

    /// Indicates that no more level can be consumed.
    #[error("Level {0} is the last level")]
    LevelExhausted(usize),

    /// Indicates that a level is out of range.
    #[error("Invalid level {0}, the maximum level is {1}")]
    InvalidLevel(usize, usize),

    /// Indicates that operands reside in different storages.
    #[error("Operands reside in different storages")]
    ResidencyMismatch,

    /// Indicates that bootstrapping was invoked before its parameters were
    /// generated.
    #[error("Bootstrapping parameters have not been generated")]
    BootstrappingNotConfigured,

    /// Indicates that a caller-provided buffer is too small.
    #[error("Buffer too small: {0} elements provided, {1} required")]
    BufferTooSmall(usize, usize),

    /// Indicates that an object was created under different parameters.
    #[error("The object was created under different parameters")]
    ContextMismatch,

    /// Indicates that a key-switching key uses another method than the
    /// parameters.
    #[error("Key switching method mismatch: key uses {0}, parameters use {1}")]
    KeySwitchMethodMismatch(String, String),

    /// Indicates a violation of a multiparty protocol.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Indicates a default error
    /// TODO: To delete eventually
    #[error("{0}")]
    DefaultError(String),
}

impl From<fhe_math::Error> for Error {
    fn from(e: fhe_math::Error) -> Self {
        Error::MathError(e)
    }
}

impl Error {
    /// The category of the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MathError(_) | Error::DefaultError(_) => ErrorCategory::Math,
            Error::SerializationError | Error::ContextMismatch => ErrorCategory::Serialization,
            Error::ParametersError(_) | Error::KeySwitchMethodMismatch(..) => {
                ErrorCategory::Configuration
            }
            Error::BufferTooSmall(..) => ErrorCategory::Resource,
            Error::ProtocolError(_) => ErrorCategory::Protocol,
            Error::TooManyValues(..)
            | Error::TooFewValues(..)
            | Error::UnspecifiedInput(_)
            | Error::EncodingMismatch(..)
            | Error::KeyNotGenerated(_)
            | Error::ScaleMismatch(..)
            | Error::MissingRotation(_)
            | Error::LevelExhausted(_)
            | Error::InvalidLevel(..)
            | Error::ResidencyMismatch
            | Error::BootstrappingNotConfigured => ErrorCategory::Precondition,
        }
    }

    /// Create a protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::ProtocolError(msg.into())
    }

    /// Create an error for a key that has not been generated.
    pub fn key_not_generated<S: Into<String>>(key: S) -> Self {
        Self::KeyNotGenerated(key.into())
    }

    /// Create a scale mismatch error.
    pub fn scale_mismatch(a: f64, b: f64) -> Self {
        Self::ScaleMismatch(format!("{a:e}"), format!("{b:e}"))
    }

    /// Create an error for a share coming from an unexpected party.
    pub fn invalid_party_id(party_id: usize, num_parties: usize) -> Self {
        Self::ProtocolError(format!(
            "Invalid party ID: {party_id}, must be below {num_parties}"
        ))
    }

    /// Create an error for a party contributing twice.
    pub fn duplicate_party(party_id: usize) -> Self {
        Self::ProtocolError(format!("Party {party_id} contributed more than once"))
    }
}

/// Separate enum to indicate parameters-related errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParametersError {
    /// Indicates that the degree is invalid.
    #[error("Invalid degree: {0} is not a power of 2 between 8 and 65536")]
    InvalidDegree(usize),

    /// Indicates that the moduli sizes are invalid.
    #[error("Invalid modulus size: {0}, expected an integer between {1} and {2}")]
    InvalidModulusSize(usize, usize, usize),

    /// Indicates that there exists not enough primes of this size.
    #[error("Not enough primes of size {0} for polynomials of degree {1}")]
    NotEnoughPrimes(usize, usize),

    /// Indicates that the scale is invalid.
    #[error("Invalid scale: {0}")]
    InvalidScale(String),

    /// Indicates that the variance is invalid.
    #[error("Invalid variance: {0}, expected an integer between 1 and 16")]
    InvalidVariance(usize),

    /// Indicates that the modulus is too large for the security level.
    #[error("The modulus has {0} bits, above the {1} bits allowed for this security level")]
    InsufficientSecurity(usize, usize),

    /// Indicates that the key switching method cannot be used.
    #[error("Invalid key switching method: {0}")]
    InvalidKeySwitchMethod(String),

    /// Indicates that the moduli chain is too short for a computation.
    #[error("Not enough levels: {0} required, {1} available")]
    InsufficientLevels(usize, usize),

    /// Indicates that a bootstrapping configuration is invalid.
    #[error("Invalid bootstrapping configuration: {0}")]
    InvalidBootstrappingConfig(String),

    /// Indicates that too many parameters were specified.
    #[error("{0}")]
    TooManySpecified(String),

    /// Indicates that too few parameters were specified.
    #[error("{0}")]
    TooFewSpecified(String),
}

impl From<ParametersError> for Error {
    fn from(e: ParametersError) -> Self {
        Error::ParametersError(e)
    }
}
