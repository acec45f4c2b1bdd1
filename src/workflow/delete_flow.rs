use crate::ops::delete::DeleteImpact;

/// `Confirm → Options → ImpactReview → Execute`; a blocked review goes back
/// to `Options`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    Confirm,
    Options,
    ImpactReview,
    Execute,
    Aborted,
}

impl DeleteStep {
    /// First step for a selection; an empty selection never starts.
    pub fn begin(ids: &[String]) -> DeleteStep {
        if ids.is_empty() {
            DeleteStep::Aborted
        } else {
            DeleteStep::Confirm
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeleteStep::Execute | DeleteStep::Aborted)
    }
}

/// Next step after the user resolves `step`. `impact` is the analysis shown
/// during `ImpactReview` and is ignored elsewhere.
pub fn advance(step: DeleteStep, accepted: bool, impact: Option<&DeleteImpact>) -> DeleteStep {
    match step {
        DeleteStep::Confirm if accepted => DeleteStep::Options,
        DeleteStep::Options if accepted => DeleteStep::ImpactReview,
        DeleteStep::ImpactReview => match impact {
            _ if !accepted => DeleteStep::Aborted,
            Some(impact) if impact.is_blocked() => DeleteStep::Options,
            Some(_) => DeleteStep::Execute,
            None => DeleteStep::ImpactReview,
        },
        DeleteStep::Confirm | DeleteStep::Options => DeleteStep::Aborted,
        DeleteStep::Execute | DeleteStep::Aborted => step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::delete::{BlockKind, Blocker};

    fn blocked() -> DeleteImpact {
        DeleteImpact {
            total_delete_count: 1,
            blocker: Some(Blocker {
                kind: BlockKind::HasDependents,
                reason: "has 3 dependents".into(),
            }),
            warnings: vec![],
            dependents: vec!["4".into(), "5".into(), "6".into()],
        }
    }

    fn clear() -> DeleteImpact {
        DeleteImpact {
            total_delete_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn happy_path_reaches_execute() {
        let mut step = DeleteStep::begin(&["1".to_string()]);
        step = advance(step, true, None);
        assert_eq!(step, DeleteStep::Options);
        step = advance(step, true, None);
        assert_eq!(step, DeleteStep::ImpactReview);
        step = advance(step, true, Some(&clear()));
        assert_eq!(step, DeleteStep::Execute);
    }

    #[test]
    fn blocked_review_returns_to_options() {
        let impact = blocked();
        let step = advance(DeleteStep::ImpactReview, true, Some(&impact));
        assert_eq!(step, DeleteStep::Options);
        assert_ne!(step, DeleteStep::Execute);
    }

    #[test]
    fn declining_any_step_aborts() {
        assert_eq!(advance(DeleteStep::Confirm, false, None), DeleteStep::Aborted);
        assert_eq!(advance(DeleteStep::Options, false, None), DeleteStep::Aborted);
        assert_eq!(
            advance(DeleteStep::ImpactReview, false, Some(&clear())),
            DeleteStep::Aborted
        );
    }

    #[test]
    fn empty_selection_never_starts() {
        assert_eq!(DeleteStep::begin(&[]), DeleteStep::Aborted);
        assert!(DeleteStep::Aborted.is_terminal());
    }

    #[test]
    fn review_waits_for_analysis() {
        assert_eq!(advance(DeleteStep::ImpactReview, true, None), DeleteStep::ImpactReview);
    }
}
