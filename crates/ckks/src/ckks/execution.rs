//! Execution options: stream ordering and storage residency.
//!
//! Kernels run on the rayon thread pool, one task per RNS limb, and every
//! call returns once its kernels have completed. Operations issued on the
//! same [`Stream`] therefore execute in submission order.

use crate::{Error, Result};

/// Where the coefficients of a container reside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Storage {
    /// Host memory.
    #[default]
    Host,
    /// Accelerator memory.
    Device,
}

impl Storage {
    pub(crate) fn to_u32(self) -> u32 {
        match self {
            Storage::Host => 0,
            Storage::Device => 1,
        }
    }

    pub(crate) fn try_from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Storage::Host),
            1 => Ok(Storage::Device),
            _ => Err(Error::SerializationError),
        }
    }
}

/// An ordered queue of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Stream {
    id: u64,
}

impl Stream {
    /// Create a stream with the given identifier.
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    /// Returns the identifier of the stream.
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Placement of the operands and results of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResidencyPolicy {
    /// Operands stay where they are, and results are created next to them.
    /// All operands must reside in the same storage.
    #[default]
    KeepInitial,
    /// Operands are staged to the target storage, where results are created.
    MoveToTarget,
}

/// Options accepted by the operations of the scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExecutionOptions {
    stream: Stream,
    storage: Storage,
    policy: ResidencyPolicy,
}

impl ExecutionOptions {
    /// Options executing on the default stream and keeping operands in place.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream on which the operations are issued.
    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    /// Set the target storage.
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// Set the residency policy.
    pub fn with_policy(mut self, policy: ResidencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the stream.
    pub const fn stream(&self) -> Stream {
        self.stream
    }

    /// Returns the target storage.
    pub const fn storage(&self) -> Storage {
        self.storage
    }

    /// Returns the residency policy.
    pub const fn policy(&self) -> ResidencyPolicy {
        self.policy
    }

    /// Returns the storage of the result of an operation on operands residing
    /// in `inputs`.
    pub(crate) fn resolve(&self, inputs: &[Storage]) -> Result<Storage> {
        match self.policy {
            ResidencyPolicy::KeepInitial => {
                let first = inputs.first().copied().unwrap_or(self.storage);
                if inputs.iter().any(|s| *s != first) {
                    Err(Error::ResidencyMismatch)
                } else {
                    Ok(first)
                }
            }
            ResidencyPolicy::MoveToTarget => Ok(self.storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionOptions, ResidencyPolicy, Storage, Stream};
    use crate::Error;

    #[test]
    fn defaults() {
        let options = ExecutionOptions::new();
        assert_eq!(options.stream(), Stream::new(0));
        assert_eq!(options.storage(), Storage::Host);
        assert_eq!(options.policy(), ResidencyPolicy::KeepInitial);
    }

    #[test]
    fn resolve() {
        let keep = ExecutionOptions::new().with_storage(Storage::Device);
        assert_eq!(keep.resolve(&[Storage::Host, Storage::Host]), Ok(Storage::Host));
        assert_eq!(keep.resolve(&[Storage::Device]), Ok(Storage::Device));
        assert_eq!(
            keep.resolve(&[Storage::Host, Storage::Device]),
            Err(Error::ResidencyMismatch)
        );

        let moving = keep.with_policy(ResidencyPolicy::MoveToTarget).with_stream(Stream::new(3));
        assert_eq!(moving.stream().id(), 3);
        assert_eq!(
            moving.resolve(&[Storage::Host, Storage::Device]),
            Ok(Storage::Device)
        );
    }

    #[test]
    fn storage_codes() {
        for storage in [Storage::Host, Storage::Device] {
            assert_eq!(Storage::try_from_u32(storage.to_u32()), Ok(storage));
        }
        assert_eq!(Storage::try_from_u32(2), Err(Error::SerializationError));
    }
}
