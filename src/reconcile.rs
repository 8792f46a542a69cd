//! Attendee reconciliation: converge a meetup's remote attendee links onto
//! a desired member set with the fewest inserts and deletes.
//!
//! Diffing is a pure set difference. Applying runs two phases, removals then
//! additions, each fanned out concurrently and awaited as a whole. A failed
//! row never rolls back the rows that succeeded; re-running against the
//! store's actual state recomputes whatever is left.

use crate::error::{BatchFailure, BatchOp, ClubError, ClubResult};
use crate::models::{AttendeeLink, MeetupId, MemberId, NewAttendeeLink};
use crate::storage::MeetupStore;
use futures::future::join_all;
use log::{debug, error, info};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendeeDiff {
    pub to_add: HashSet<MemberId>,
    pub to_remove: HashSet<MemberId>,
}

impl AttendeeDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// `to_add = desired - current`, `to_remove = current - desired`. Members in
/// both sets are left alone, so their payment fields are never reset.
pub fn diff(current: &HashSet<MemberId>, desired: &HashSet<MemberId>) -> AttendeeDiff {
    AttendeeDiff {
        to_add: desired.difference(current).copied().collect(),
        to_remove: current.difference(desired).copied().collect(),
    }
}

/// Concrete rows to delete and insert for one meetup
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub meetup_id: MeetupId,
    pub removals: Vec<AttendeeLink>,
    pub additions: Vec<NewAttendeeLink>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removals.len() + self.additions.len()
    }
}

pub fn plan(
    meetup_id: MeetupId,
    current_links: &[AttendeeLink],
    desired: &HashSet<MemberId>,
) -> ReconcilePlan {
    let current: HashSet<MemberId> = current_links.iter().map(|l| l.member_id).collect();
    let delta = diff(&current, desired);

    let mut removals: Vec<AttendeeLink> = current_links
        .iter()
        .filter(|l| delta.to_remove.contains(&l.member_id))
        .cloned()
        .collect();
    removals.sort_by_key(|l| (l.member_id, l.id));

    let mut to_add: Vec<MemberId> = delta.to_add.into_iter().collect();
    to_add.sort();
    let additions = to_add
        .into_iter()
        .map(|member_id| NewAttendeeLink::fresh(meetup_id, member_id))
        .collect();

    ReconcilePlan {
        meetup_id,
        removals,
        additions,
    }
}

/// Outcome of one applied plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub meetup_id: MeetupId,
    pub removed: Vec<MemberId>,
    pub added: Vec<AttendeeLink>,
    pub failures: Vec<BatchFailure>,
}

impl ReconcileReport {
    fn new(meetup_id: MeetupId) -> Self {
        Self {
            meetup_id,
            removed: Vec::new(),
            added: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.removed.len() + self.added.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One `PartialBatch` error for the whole pass if any row failed.
    pub fn into_result(self) -> ClubResult<Self> {
        if self.is_clean() {
            return Ok(self);
        }
        Err(ClubError::PartialBatch {
            failed: self.failures.len(),
            attempted: self.attempted(),
            failures: self.failures,
        })
    }
}

pub async fn apply<S>(store: &S, plan: ReconcilePlan) -> ReconcileReport
where
    S: MeetupStore + ?Sized,
{
    let pass = Uuid::new_v4();
    let mut report = ReconcileReport::new(plan.meetup_id);
    if plan.is_empty() {
        debug!("Reconcile[{}]: meetup {} already up to date", pass, plan.meetup_id);
        return report;
    }
    info!(
        "Reconcile[{}]: meetup {} -{} +{}",
        pass,
        plan.meetup_id,
        plan.removals.len(),
        plan.additions.len()
    );

    let removals = join_all(plan.removals.iter().map(|link| async move {
        (link.member_id, store.delete_attendee(link.id).await)
    }))
    .await;
    for (member_id, result) in removals {
        match result {
            Ok(()) => report.removed.push(member_id),
            Err(e) => {
                error!("Reconcile[{}]: failed to remove member {}: {}", pass, member_id, e);
                report.failures.push(BatchFailure {
                    op: BatchOp::Remove,
                    member_id,
                    message: e.to_string(),
                });
            }
        }
    }

    let additions = join_all(plan.additions.iter().map(|link| async move {
        (link.member_id, store.create_attendee(link).await)
    }))
    .await;
    for (member_id, result) in additions {
        match result {
            Ok(created) => report.added.push(created),
            Err(e) => {
                error!("Reconcile[{}]: failed to add member {}: {}", pass, member_id, e);
                report.failures.push(BatchFailure {
                    op: BatchOp::Add,
                    member_id,
                    message: e.to_string(),
                });
            }
        }
    }

    if report.is_clean() {
        info!("Reconcile[{}]: applied {} changes", pass, report.attempted());
    } else {
        error!(
            "Reconcile[{}]: {} of {} changes failed",
            pass,
            report.failures.len(),
            report.attempted()
        );
    }
    report
}

/// Fetch the meetup's current links, then plan and apply against them.
/// Only the fetch can fail outright; row failures land in the report.
pub async fn reconcile<S>(
    store: &S,
    meetup_id: MeetupId,
    desired: &HashSet<MemberId>,
) -> ClubResult<ReconcileReport>
where
    S: MeetupStore + ?Sized,
{
    let current = store.list_attendees(Some(meetup_id)).await?;
    Ok(apply(store, plan(meetup_id, &current, desired)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendeeLinkId;
    use pretty_assertions::assert_eq;

    fn ids(values: &[i64]) -> HashSet<MemberId> {
        values.iter().copied().map(MemberId).collect()
    }

    fn link(id: i64, member: i64, paid: bool) -> AttendeeLink {
        AttendeeLink {
            id: AttendeeLinkId(id),
            meetup_id: MeetupId(1),
            member_id: MemberId(member),
            donation_paid: paid,
            donation_amount: if paid { 5000 } else { 0 },
            members: None,
        }
    }

    #[test]
    fn test_diff_scenario() {
        let delta = diff(&ids(&[1, 2, 3]), &ids(&[2, 3, 4]));
        assert_eq!(delta.to_add, ids(&[4]));
        assert_eq!(delta.to_remove, ids(&[1]));
    }

    #[test]
    fn test_diff_is_idempotent() {
        let desired = ids(&[5, 6, 7]);
        assert!(diff(&desired, &desired).is_empty());
        assert!(diff(&HashSet::new(), &HashSet::new()).is_empty());
    }

    #[test]
    fn test_convergence_law() {
        let cases = [
            (vec![], vec![1, 2]),
            (vec![1, 2], vec![]),
            (vec![1, 2, 3], vec![3, 4, 5]),
            (vec![10, 20], vec![10, 20]),
            (vec![1, 3, 5, 7, 9], vec![2, 3, 4, 5, 6]),
        ];
        for (current, desired) in cases {
            let current = ids(&current);
            let desired = ids(&desired);
            let delta = diff(&current, &desired);

            assert!(delta.to_add.is_disjoint(&delta.to_remove));
            let converged: HashSet<MemberId> = current
                .difference(&delta.to_remove)
                .copied()
                .chain(delta.to_add.iter().copied())
                .collect();
            assert_eq!(converged, desired);
        }
    }

    #[test]
    fn test_plan_leaves_unchanged_links_alone() {
        let current = vec![link(11, 1, false), link(12, 2, true), link(13, 3, true)];
        let plan = plan(MeetupId(1), &current, &ids(&[2, 3, 4]));

        assert_eq!(plan.removals, vec![link(11, 1, false)]);
        assert_eq!(plan.additions, vec![NewAttendeeLink::fresh(MeetupId(1), MemberId(4))]);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_partial_batch_error() {
        let report = ReconcileReport {
            meetup_id: MeetupId(1),
            removed: vec![MemberId(1)],
            added: vec![],
            failures: vec![BatchFailure {
                op: BatchOp::Add,
                member_id: MemberId(4),
                message: "boom".to_string(),
            }],
        };
        match report.into_result() {
            Err(ClubError::PartialBatch { failed, attempted, .. }) => {
                assert_eq!(failed, 1);
                assert_eq!(attempted, 2);
            }
            other => panic!("expected partial batch error, got {:?}", other),
        }
    }
}
