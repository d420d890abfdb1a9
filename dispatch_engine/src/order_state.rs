//! The order state machine.
//!
//! Every status write in the engine is checked against [`OrderStatusType::can_transition_to`] inside the same
//! transaction that reads the stored status, and then applied as a conditional update on that stored status. Moves that
//! are not in the table below are rejected outright.
//!
//! | From                  | Allowed targets                                                   |
//! |-----------------------|-------------------------------------------------------------------|
//! | pending_payment       | awaiting_assignment, payment_failed, cancelled, refunded          |
//! | awaiting_assignment   | assigned, cancelled, refunded                                     |
//! | assigned              | vendor_accepted, cancelled, refunded                              |
//! | vendor_accepted       | in_progress, cancelled, refunded                                  |
//! | in_progress           | completed, cancelled, refunded                                    |
//! | payment_failed        | pending_payment, cancelled, refunded                              |
//! | completed, cancelled, refunded | (terminal)                                               |
use thiserror::Error;

use crate::db_types::OrderStatusType::{self, *};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("An order cannot move from {current} to {attempted}")]
pub struct TransitionError {
    pub current: OrderStatusType,
    pub attempted: OrderStatusType,
}

impl OrderStatusType {
    pub fn allowed_transitions(&self) -> &'static [OrderStatusType] {
        match self {
            PendingPayment => &[AwaitingAssignment, PaymentFailed, Cancelled, Refunded],
            AwaitingAssignment => &[Assigned, Cancelled, Refunded],
            Assigned => &[VendorAccepted, Cancelled, Refunded],
            VendorAccepted => &[InProgress, Cancelled, Refunded],
            InProgress => &[Completed, Cancelled, Refunded],
            PaymentFailed => &[PendingPayment, Cancelled, Refunded],
            Completed | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// States in which the order must reference exactly one vendor.
    pub fn requires_vendor(&self) -> bool {
        matches!(self, Assigned | VendorAccepted | InProgress | Completed)
    }

    /// The statuses a vendor may set on an order assigned to them.
    pub fn is_vendor_progression(&self) -> bool {
        matches!(self, VendorAccepted | InProgress | Completed)
    }

    /// Closing states: the order is taken away from its vendor and all open offers are withdrawn.
    pub fn is_annulment(&self) -> bool {
        matches!(self, Cancelled | Refunded)
    }

    /// The timestamp column stamped when an order enters this state.
    pub fn timestamp_column(&self) -> Option<&'static str> {
        match self {
            Assigned => Some("assigned_at"),
            VendorAccepted => Some("accepted_at"),
            InProgress => Some("started_at"),
            Completed => Some("completed_at"),
            Cancelled | Refunded => Some("cancelled_at"),
            PendingPayment | AwaitingAssignment | PaymentFailed => None,
        }
    }
}

pub fn check_transition(current: OrderStatusType, attempted: OrderStatusType) -> Result<(), TransitionError> {
    if current.can_transition_to(attempted) {
        Ok(())
    } else {
        Err(TransitionError { current, attempted })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn happy_path() {
        let path = [PendingPayment, AwaitingAssignment, Assigned, VendorAccepted, InProgress, Completed];
        for pair in path.windows(2) {
            assert!(check_transition(pair[0], pair[1]).is_ok(), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn no_skipping_ahead() {
        assert_eq!(
            check_transition(AwaitingAssignment, InProgress),
            Err(TransitionError { current: AwaitingAssignment, attempted: InProgress })
        );
        assert!(check_transition(Assigned, Completed).is_err());
        assert!(check_transition(PendingPayment, Assigned).is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Completed, Cancelled, Refunded] {
            assert!(terminal.is_terminal());
            for next in OrderStatusType::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn self_transitions_are_invalid() {
        for status in OrderStatusType::ALL {
            assert!(!status.can_transition_to(status), "{status}");
        }
    }

    #[test]
    fn payment_retry() {
        assert!(check_transition(PendingPayment, PaymentFailed).is_ok());
        assert!(check_transition(PaymentFailed, PendingPayment).is_ok());
        assert!(check_transition(PaymentFailed, AwaitingAssignment).is_err());
    }

    #[test]
    fn every_live_state_can_be_cancelled_or_refunded() {
        for status in OrderStatusType::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(Cancelled), "{status}");
            assert!(status.can_transition_to(Refunded), "{status}");
        }
    }

    #[test]
    fn error_message_names_both_states() {
        let err = check_transition(Completed, Assigned).unwrap_err();
        assert_eq!(err.to_string(), "An order cannot move from completed to assigned");
    }
}
