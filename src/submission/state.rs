// Form entry status machine.
//
//   new       -> draft | submitted
//   draft     -> draft | submitted
//   rejected  -> draft | submitted
//   approved  -> draft | submitted   (edit, recorded as a new version)
//   submitted -> approved | rejected (review only)

use super::SubmitError;
use crate::types::{FormStatus, SubmitIntent};

/// Status after the owner saves or submits data
pub fn after_edit(current: Option<FormStatus>, intent: SubmitIntent) -> Result<FormStatus, SubmitError> {
    let target = intent.target_status();
    match current {
        None | Some(FormStatus::Draft) | Some(FormStatus::Rejected) | Some(FormStatus::Approved) => Ok(target),
        Some(FormStatus::Submitted) => Err(SubmitError::InvalidTransition {
            from: FormStatus::Submitted,
            to: target,
        }),
    }
}

/// Status after a reviewer decides; `decision` is approved or rejected
pub fn after_review(current: FormStatus, decision: FormStatus) -> Result<FormStatus, SubmitError> {
    match (current, decision) {
        (FormStatus::Submitted, FormStatus::Approved) | (FormStatus::Submitted, FormStatus::Rejected) => Ok(decision),
        (from, to) => Err(SubmitError::InvalidTransition { from, to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FormStatus; 4] = [
        FormStatus::Draft,
        FormStatus::Submitted,
        FormStatus::Approved,
        FormStatus::Rejected,
    ];

    #[test]
    fn new_entries_become_draft_or_submitted() {
        assert_eq!(after_edit(None, SubmitIntent::Draft), Ok(FormStatus::Draft));
        assert_eq!(after_edit(None, SubmitIntent::Submit), Ok(FormStatus::Submitted));
    }

    #[test]
    fn entries_under_review_cannot_be_edited() {
        for intent in [SubmitIntent::Draft, SubmitIntent::Submit] {
            assert!(after_edit(Some(FormStatus::Submitted), intent).is_err());
        }
    }

    #[test]
    fn only_submitted_entries_can_be_reviewed() {
        for from in ALL {
            for decision in [FormStatus::Approved, FormStatus::Rejected] {
                assert_eq!(after_review(from, decision).is_ok(), from == FormStatus::Submitted);
            }
        }
    }

    #[test]
    fn nothing_moves_draft_to_approved() {
        for intent in [SubmitIntent::Draft, SubmitIntent::Submit] {
            assert_ne!(after_edit(Some(FormStatus::Draft), intent), Ok(FormStatus::Approved));
        }
        assert!(after_review(FormStatus::Draft, FormStatus::Approved).is_err());
    }
}
