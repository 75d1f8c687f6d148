//! Incremental hash algorithm abstraction

use std::fmt;

/// An incremental hash algorithm that can be reused after finalization.
///
/// [`HashStream`](crate::HashStream) feeds bytes through this trait, so any
/// checksum with a resettable state can back a verifying stream.
pub trait HashAlgorithm {
    /// The finalized hash value
    type Output: Clone + PartialEq + Eq + fmt::Debug + fmt::Display;

    /// Feed bytes into the running hash
    fn update(&mut self, data: &[u8]);

    /// Finalize the running hash and reset to the initial state
    fn finalize_reset(&mut self) -> Self::Output;

    /// Discard the running hash and return to the initial state
    fn reset(&mut self);
}
