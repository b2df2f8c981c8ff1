//! Rotation cursor
//!
//! [`RotationState`] is owned by the controller loop and passed by `&mut` into
//! each cycle. Nothing else reads or writes it, so it needs no locking.

use crate::config::AdvancePolicy;
use crate::error::{Error, Result};

/// Ordered candidate addresses and the position of the next one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationState {
    addresses: Vec<String>,
    index: usize,
}

/// The address picked for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Address to apply
    pub address: String,
    /// Its position in the list
    pub index: usize,
}

impl RotationState {
    /// Start at the first address
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            index: 0,
        }
    }

    /// Number of candidate addresses
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns `true` if there is nothing to rotate through
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Index of the address the next cycle will pick
    pub fn index(&self) -> usize {
        self.index
    }

    /// Candidate addresses in rotation order
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Pick the address for a new cycle
    ///
    /// Under [`AdvancePolicy::SkipForward`] the cursor moves on immediately, so
    /// an address that then fails to apply is not retried next cycle.
    pub fn select(&mut self, policy: AdvancePolicy) -> Result<Selection> {
        if self.addresses.is_empty() {
            return Err(Error::NoAddressesConfigured);
        }

        let selection = Selection {
            address: self.addresses[self.index].clone(),
            index: self.index,
        };

        if policy == AdvancePolicy::SkipForward {
            self.advance();
        }

        Ok(selection)
    }

    /// Record that the cycle for `selection` succeeded
    ///
    /// Under [`AdvancePolicy::RetrySame`] this is what moves the cursor.
    pub fn complete(&mut self, selection: &Selection, policy: AdvancePolicy) {
        if policy == AdvancePolicy::RetrySame && selection.index == self.index {
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.addresses.len();
    }
}
