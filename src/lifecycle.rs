//! Status transition rules for applications and offers
//!
//! This module only answers whether a status change is legal. Callers persist
//! the change after validation succeeds.

use crate::application::ApplicationStatus;
use crate::error::{DomainError, DomainResult};
use crate::offer::OfferStatus;

/// A status enum with a fixed transition table
pub trait StatusMachine: Copy + PartialEq + std::fmt::Display + 'static {
    /// Targets reachable from `self` in one step
    fn allowed_targets(&self) -> &'static [Self];
}

impl StatusMachine for ApplicationStatus {
    fn allowed_targets(&self) -> &'static [Self] {
        use ApplicationStatus::*;
        match self {
            Draft => &[Submitted, Rejected],
            Submitted => &[UnderReview, Rejected],
            UnderReview => &[OffersAvailable, Rejected],
            OffersAvailable => &[Accepted, Rejected],
            // Submitted is only reachable through expiration reconciliation
            Accepted => &[Completed, Rejected, Submitted],
            Completed | Rejected => &[],
        }
    }
}

impl StatusMachine for OfferStatus {
    fn allowed_targets(&self) -> &'static [Self] {
        use OfferStatus::*;
        match self {
            Calculated => &[Submitted, Accepted, Rejected, Withdrawn, Expired],
            Submitted => &[Accepted, Rejected, Withdrawn, Expired, ExpiredWithSelection],
            // Calculated is the deselection path when the borrower switches offers
            Accepted => &[Calculated, ExpiredWithSelection],
            Rejected | Withdrawn | Expired | ExpiredWithSelection => &[],
        }
    }
}

/// Whether `current -> target` is in the transition table
pub fn can_transition<S: StatusMachine>(current: S, target: S) -> bool {
    current.allowed_targets().contains(&target)
}

/// Fail with `InvalidTransition` unless `current -> target` is allowed
pub fn require_transition<S: StatusMachine>(current: S, target: S) -> DomainResult<()> {
    if can_transition(current, target) {
        Ok(())
    } else {
        Err(DomainError::invalid_transition(current, target))
    }
}

/// The one backward application edge, reserved for expiration reconciliation
pub fn is_reconciliation(current: ApplicationStatus, target: ApplicationStatus) -> bool {
    current == ApplicationStatus::Accepted && target == ApplicationStatus::Submitted
}

/// Transition check for general-purpose application updates, which may not
/// take the reconciliation edge
pub fn require_manual_application_transition(
    current: ApplicationStatus,
    target: ApplicationStatus,
) -> DomainResult<()> {
    if is_reconciliation(current, target) {
        return Err(DomainError::invalid_transition(current, target));
    }
    require_transition(current, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLICATION_TABLE: &[(ApplicationStatus, ApplicationStatus)] = &[
        (ApplicationStatus::Draft, ApplicationStatus::Submitted),
        (ApplicationStatus::Draft, ApplicationStatus::Rejected),
        (ApplicationStatus::Submitted, ApplicationStatus::UnderReview),
        (ApplicationStatus::Submitted, ApplicationStatus::Rejected),
        (ApplicationStatus::UnderReview, ApplicationStatus::OffersAvailable),
        (ApplicationStatus::UnderReview, ApplicationStatus::Rejected),
        (ApplicationStatus::OffersAvailable, ApplicationStatus::Accepted),
        (ApplicationStatus::OffersAvailable, ApplicationStatus::Rejected),
        (ApplicationStatus::Accepted, ApplicationStatus::Completed),
        (ApplicationStatus::Accepted, ApplicationStatus::Rejected),
        (ApplicationStatus::Accepted, ApplicationStatus::Submitted),
    ];

    const OFFER_TABLE: &[(OfferStatus, OfferStatus)] = &[
        (OfferStatus::Calculated, OfferStatus::Submitted),
        (OfferStatus::Calculated, OfferStatus::Accepted),
        (OfferStatus::Calculated, OfferStatus::Rejected),
        (OfferStatus::Calculated, OfferStatus::Withdrawn),
        (OfferStatus::Calculated, OfferStatus::Expired),
        (OfferStatus::Submitted, OfferStatus::Accepted),
        (OfferStatus::Submitted, OfferStatus::Rejected),
        (OfferStatus::Submitted, OfferStatus::Withdrawn),
        (OfferStatus::Submitted, OfferStatus::Expired),
        (OfferStatus::Submitted, OfferStatus::ExpiredWithSelection),
        (OfferStatus::Accepted, OfferStatus::Calculated),
        (OfferStatus::Accepted, OfferStatus::ExpiredWithSelection),
    ];

    fn check_every_pair<S: StatusMachine + std::fmt::Debug>(all: &[S], table: &[(S, S)]) {
        for &current in all {
            for &target in all {
                let expected = table.contains(&(current, target));
                assert_eq!(
                    can_transition(current, target),
                    expected,
                    "{:?} -> {:?}",
                    current,
                    target
                );
                match require_transition(current, target) {
                    Ok(()) => assert!(expected),
                    Err(DomainError::InvalidTransition { from, to }) => {
                        assert!(!expected);
                        assert_eq!(from, current.to_string());
                        assert_eq!(to, target.to_string());
                    }
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_application_table_is_complete() {
        check_every_pair(&ApplicationStatus::ALL, APPLICATION_TABLE);
    }

    #[test]
    fn test_offer_table_is_complete() {
        check_every_pair(&OfferStatus::ALL, OFFER_TABLE);
    }

    #[test]
    fn test_rejected_reachable_from_every_non_terminal_state() {
        for status in ApplicationStatus::ALL {
            assert_eq!(
                can_transition(status, ApplicationStatus::Rejected),
                !status.is_terminal()
            );
        }
    }

    #[test]
    fn test_manual_update_refuses_reconciliation_edge() {
        assert!(require_transition(ApplicationStatus::Accepted, ApplicationStatus::Submitted).is_ok());
        assert!(require_manual_application_transition(
            ApplicationStatus::Accepted,
            ApplicationStatus::Submitted
        )
        .is_err());
        assert!(require_manual_application_transition(
            ApplicationStatus::Accepted,
            ApplicationStatus::Completed
        )
        .is_ok());
    }

    #[test]
    fn test_expiry_targets_are_legal_transitions() {
        for status in OfferStatus::EXPIRABLE {
            let target = status.expiry_target().unwrap();
            assert!(can_transition(status, target));
        }
    }
}
