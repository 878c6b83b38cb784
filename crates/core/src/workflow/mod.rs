//! Forward-transition planning for workflow templates.
//!
//! Storage backends load the template's existing transitions, ask for a plan
//! and apply it inside their own transaction. Create and update share this
//! code so the consecutive-pair invariant is enforced in one place.

use std::collections::BTreeSet;

use crate::domain::workflow::{StageId, Transition, TransitionId, TransitionKind};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Consecutive pairs with no reusable row.
    pub insert: Vec<(StageId, StageId)>,
    /// Inactive rows that become the pair's active forward transition.
    pub activate: Vec<TransitionId>,
    /// Active forward rows whose pair is no longer consecutive.
    pub deactivate: Vec<TransitionId>,
}

impl TransitionPlan {
    pub fn is_noop(&self) -> bool {
        self.insert.is_empty() && self.activate.is_empty() && self.deactivate.is_empty()
    }
}

/// Consecutive pairs of `ordered`, first occurrence only.
pub fn desired_forward_pairs(ordered: &[StageId]) -> Vec<(StageId, StageId)> {
    let mut seen = BTreeSet::new();
    ordered
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .filter(|pair| seen.insert(*pair))
        .collect()
}

/// Plans the forward transitions for stages in final order `ordered`.
///
/// `existing` holds every transition among the template's stages; non-forward
/// kinds are ignored and never appear in the plan.
pub fn plan_forward_transitions(ordered: &[StageId], existing: &[Transition]) -> TransitionPlan {
    let desired = desired_forward_pairs(ordered);
    let mut forward: Vec<&Transition> =
        existing.iter().filter(|transition| transition.kind == TransitionKind::Forward).collect();
    forward.sort_by_key(|transition| transition.id);

    let mut plan = TransitionPlan::default();
    for &(from, to) in &desired {
        let same_pair: Vec<&Transition> = forward
            .iter()
            .copied()
            .filter(|transition| transition.from_stage_id == from && transition.to_stage_id == to)
            .collect();

        let mut active = same_pair.iter().filter(|transition| transition.is_active);
        if active.next().is_some() {
            plan.deactivate.extend(active.map(|transition| transition.id));
            continue;
        }

        match same_pair.first() {
            Some(inactive) => plan.activate.push(inactive.id),
            None => plan.insert.push((from, to)),
        }
    }

    let desired: BTreeSet<(StageId, StageId)> = desired.into_iter().collect();
    plan.deactivate.extend(
        forward
            .iter()
            .filter(|transition| transition.is_active)
            .filter(|transition| !desired.contains(&(transition.from_stage_id, transition.to_stage_id)))
            .map(|transition| transition.id),
    );
    plan.deactivate.sort();
    plan.deactivate.dedup();
    plan
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{desired_forward_pairs, plan_forward_transitions, TransitionPlan};
    use crate::domain::workflow::{StageId, Transition, TransitionId, TransitionKind};

    fn transition(id: i64, from: i64, to: i64, kind: TransitionKind, active: bool) -> Transition {
        Transition {
            id: TransitionId(id),
            from_stage_id: StageId(from),
            to_stage_id: StageId(to),
            kind,
            condition: json!({}),
            is_active: active,
        }
    }

    fn ids(values: &[i64]) -> Vec<StageId> {
        values.iter().copied().map(StageId).collect()
    }

    #[test]
    fn fresh_template_inserts_one_pair_per_neighbour() {
        let plan = plan_forward_transitions(&ids(&[1, 2, 3, 4]), &[]);

        assert_eq!(
            plan.insert,
            vec![(StageId(1), StageId(2)), (StageId(2), StageId(3)), (StageId(3), StageId(4))]
        );
        assert!(plan.activate.is_empty());
        assert!(plan.deactivate.is_empty());
    }

    #[test]
    fn single_stage_template_needs_no_transitions() {
        assert!(plan_forward_transitions(&ids(&[9]), &[]).is_noop());
        assert!(desired_forward_pairs(&[]).is_empty());
    }

    #[test]
    fn unchanged_order_is_a_noop() {
        let existing = vec![
            transition(1, 1, 2, TransitionKind::Forward, true),
            transition(2, 2, 3, TransitionKind::Forward, true),
        ];

        assert_eq!(plan_forward_transitions(&ids(&[1, 2, 3]), &existing), TransitionPlan::default());
    }

    #[test]
    fn reorder_reuses_existing_pair_and_retires_stale_one() {
        // Draft=1, XEN Review=2, CE Approval=3; reordered to [CE, Draft, XEN].
        let existing = vec![
            transition(10, 1, 2, TransitionKind::Forward, true),
            transition(11, 2, 3, TransitionKind::Forward, true),
        ];

        let plan = plan_forward_transitions(&ids(&[3, 1, 2]), &existing);

        assert_eq!(plan.insert, vec![(StageId(3), StageId(1))]);
        assert!(plan.activate.is_empty());
        assert_eq!(plan.deactivate, vec![TransitionId(11)]);
    }

    #[test]
    fn inactive_row_is_reactivated_instead_of_duplicated() {
        let existing = vec![
            transition(10, 1, 2, TransitionKind::Forward, false),
            transition(12, 1, 2, TransitionKind::Forward, false),
            transition(11, 2, 1, TransitionKind::Forward, true),
        ];

        let plan = plan_forward_transitions(&ids(&[1, 2]), &existing);

        assert!(plan.insert.is_empty());
        assert_eq!(plan.activate, vec![TransitionId(10)]);
        assert_eq!(plan.deactivate, vec![TransitionId(11)]);
    }

    #[test]
    fn duplicate_active_rows_collapse_to_the_oldest() {
        let existing = vec![
            transition(21, 1, 2, TransitionKind::Forward, true),
            transition(20, 1, 2, TransitionKind::Forward, true),
        ];

        let plan = plan_forward_transitions(&ids(&[1, 2]), &existing);

        assert!(plan.insert.is_empty());
        assert_eq!(plan.deactivate, vec![TransitionId(21)]);
    }

    #[test]
    fn return_and_escalate_edges_are_left_alone() {
        let existing = vec![
            transition(30, 2, 1, TransitionKind::Return, true),
            transition(31, 1, 3, TransitionKind::Escalate, true),
        ];

        let plan = plan_forward_transitions(&ids(&[1, 2]), &existing);

        assert_eq!(plan.insert, vec![(StageId(1), StageId(2))]);
        assert!(plan.deactivate.is_empty());
    }
}
