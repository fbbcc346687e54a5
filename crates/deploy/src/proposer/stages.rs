//! Upgrade proposal stage markers for the type-state pattern.
//!
//! The order is fixed: Resolve -> Bind -> Submit -> Return.
//! Each stage carries what the stages after it need.

use crate::{ApprovalProcess, ProposalReceipt};

/// Nothing resolved yet.
#[derive(Debug, Clone, Default)]
pub struct Resolve;

/// The approval process is known and bound.
#[derive(Debug, Clone)]
pub struct Bind {
    pub(super) approval: ApprovalProcess,
}

/// The candidate is linked; ready to submit.
#[derive(Debug, Clone)]
pub struct Submit {
    pub(super) approval: ApprovalProcess,
}

/// The service accepted the proposal.
#[derive(Debug, Clone)]
pub struct Return {
    pub(super) approval: ApprovalProcess,
    pub(super) receipt: ProposalReceipt,
}

/// Sealed trait for proposal stages.
mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Resolve {}
    impl Sealed for super::Bind {}
    impl Sealed for super::Submit {}
    impl Sealed for super::Return {}
}

/// Marker trait for valid proposal stages.
pub trait ProposalStage: sealed::Sealed + Send + Sync + 'static {}

impl ProposalStage for Resolve {}
impl ProposalStage for Bind {}
impl ProposalStage for Submit {}
impl ProposalStage for Return {}

/// Trait encoding valid stage transitions.
///
/// This is implemented only for valid transitions:
/// - Resolve -> Bind
/// - Bind -> Submit
/// - Submit -> Return
pub trait NextStage: ProposalStage {
    type Next: ProposalStage;
}

impl NextStage for Resolve {
    type Next = Bind;
}

impl NextStage for Bind {
    type Next = Submit;
}

impl NextStage for Submit {
    type Next = Return;
}

// Return has no NextStage impl - it's terminal
