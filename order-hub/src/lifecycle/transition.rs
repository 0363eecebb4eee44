//! Item status transition graph

use shared::order::ItemStatus;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move item from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ItemStatus,
    pub to: ItemStatus,
}

/// Only PENDING→ACCEPTED, PENDING→DECLINED and ACCEPTED→COMPLETED are legal
pub fn validate_transition(
    current: ItemStatus,
    requested: ItemStatus,
) -> Result<(), InvalidTransition> {
    use ItemStatus::*;

    match (current, requested) {
        (Pending, Accepted) | (Pending, Declined) | (Accepted, Completed) => Ok(()),
        (from, to) => Err(InvalidTransition { from, to }),
    }
}
