//! Status transition tables for quotations and productions.

use crate::config::TransitionPolicy;
use crate::entities::{production::ProductionStatus, quotation::QuotationStatus};
use crate::errors::ServiceError;

/// Statuses a quotation may move to `target` from.
pub fn quotation_predecessors(target: QuotationStatus) -> &'static [QuotationStatus] {
    use QuotationStatus::*;
    match target {
        Pending => &[Approved, Rejected, Working, ProductionReady, Cancelled],
        Approved => &[Pending],
        Rejected => &[Pending, Approved],
        Converted => &[Pending, Approved],
        Working => &[Pending, Approved, Converted, ProductionReady],
        ProductionReady => &[Pending, Approved, Converted, Working, Delivered],
        Delivered => &[ProductionReady],
        Completed => &[Delivered],
        Cancelled => &[Pending, Approved, Working, ProductionReady],
    }
}

/// Statuses a production may move to `target` from.
pub fn production_predecessors(target: ProductionStatus) -> &'static [ProductionStatus] {
    use ProductionStatus::*;
    match target {
        Pending => &[Working],
        Working => &[Pending, Completed],
        Completed => &[Pending, Working, Delivered],
        Cancelled => &[Pending, Working, Completed],
        Delivered => &[Completed],
    }
}

/// Validates a quotation status change. Re-applying the current status is always allowed.
pub fn check_quotation_transition(
    policy: TransitionPolicy,
    from: QuotationStatus,
    to: QuotationStatus,
) -> Result<(), ServiceError> {
    if from == to
        || policy == TransitionPolicy::Permissive
        || quotation_predecessors(to).contains(&from)
    {
        Ok(())
    } else {
        Err(ServiceError::invalid_transition("quotation", from, to))
    }
}

/// Validates a production status change. Re-applying the current status is always allowed.
pub fn check_production_transition(
    policy: TransitionPolicy,
    from: ProductionStatus,
    to: ProductionStatus,
) -> Result<(), ServiceError> {
    if from == to
        || policy == TransitionPolicy::Permissive
        || production_predecessors(to).contains(&from)
    {
        Ok(())
    } else {
        Err(ServiceError::invalid_transition("production", from, to))
    }
}

/// Quotation status implied by a production status.
pub fn quotation_status_for(status: ProductionStatus) -> QuotationStatus {
    match status {
        ProductionStatus::Completed => QuotationStatus::ProductionReady,
        ProductionStatus::Cancelled => QuotationStatus::Pending,
        ProductionStatus::Delivered => QuotationStatus::Delivered,
        ProductionStatus::Pending | ProductionStatus::Working => QuotationStatus::Working,
    }
}

/// Statuses a caller may request when creating or editing a production.
/// `delivered` is reserved for sale creation.
pub fn is_manual_production_status(status: ProductionStatus) -> bool {
    !matches!(status, ProductionStatus::Delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::Iterable;

    #[rstest]
    #[case(ProductionStatus::Completed, QuotationStatus::ProductionReady)]
    #[case(ProductionStatus::Cancelled, QuotationStatus::Pending)]
    #[case(ProductionStatus::Working, QuotationStatus::Working)]
    #[case(ProductionStatus::Pending, QuotationStatus::Working)]
    #[case(ProductionStatus::Delivered, QuotationStatus::Delivered)]
    fn production_status_drives_quotation(
        #[case] production: ProductionStatus,
        #[case] expected: QuotationStatus,
    ) {
        assert_eq!(quotation_status_for(production), expected);
    }

    #[test]
    fn same_status_is_always_allowed() {
        for status in QuotationStatus::iter() {
            assert!(check_quotation_transition(TransitionPolicy::Strict, status, status).is_ok());
        }
        for status in ProductionStatus::iter() {
            assert!(check_production_transition(TransitionPolicy::Strict, status, status).is_ok());
        }
    }

    #[test]
    fn strict_policy_rejects_unlisted_moves() {
        assert_matches!(
            check_quotation_transition(
                TransitionPolicy::Strict,
                QuotationStatus::Delivered,
                QuotationStatus::Approved
            ),
            Err(ServiceError::InvalidTransition { entity: "quotation", .. })
        );
        assert_matches!(
            check_production_transition(
                TransitionPolicy::Strict,
                ProductionStatus::Cancelled,
                ProductionStatus::Delivered
            ),
            Err(ServiceError::InvalidTransition { entity: "production", .. })
        );
    }

    #[test]
    fn permissive_policy_accepts_everything() {
        for from in QuotationStatus::iter() {
            for to in QuotationStatus::iter() {
                assert!(check_quotation_transition(TransitionPolicy::Permissive, from, to).is_ok());
            }
        }
    }

    #[test]
    fn production_side_effects_are_reachable_under_strict_policy() {
        // Every quotation status a production can write must be reachable from
        // the status the production previously wrote.
        for from in ProductionStatus::iter() {
            for to in ProductionStatus::iter() {
                if check_production_transition(TransitionPolicy::Strict, from, to).is_ok() {
                    let q_from = quotation_status_for(from);
                    let q_to = quotation_status_for(to);
                    assert!(
                        check_quotation_transition(TransitionPolicy::Strict, q_from, q_to).is_ok(),
                        "{} -> {} implies quotation {} -> {}",
                        from,
                        to,
                        q_from,
                        q_to
                    );
                }
            }
        }
    }
}
