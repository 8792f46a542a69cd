use crate::calendar::{normalize_attendees, CalendarEvent, Projection, Projector};
use crate::error::ClubResult;
use crate::models::{
    Attendee, AttendeeLink, AttendeeLinkId, AttendeePayment, AttendeeRef, Meetup, MeetupForm,
    MeetupId, Member, MemberDraft, MemberId,
};
use crate::reconcile::{self, ReconcileReport};
use crate::roster::Roster;
use crate::search::{self, MeetupFilter, MemberOption, TextQuery};
use crate::storage::MeetupStore;
use crate::validation::{validate_meetup, validate_member, validate_payment};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How long a roster snapshot is served before members are reloaded
pub const DEFAULT_ROSTER_MAX_AGE: Duration = Duration::from_secs(300);

/// Result of a meetup create/update. The meetup write itself succeeded;
/// attendee problems are reported alongside instead of failing the call.
#[derive(Debug, Clone, Serialize)]
pub struct MeetupSaved {
    pub meetup: Meetup,
    pub attendees: Option<ReconcileReport>,
    pub attendee_warning: Option<String>,
}

#[derive(Debug)]
struct CachedRoster {
    roster: Arc<Roster>,
    fresh: bool,
    loaded_at: Instant,
}

impl CachedRoster {
    fn is_current(&self, max_age: Duration) -> bool {
        self.fresh && self.loaded_at.elapsed() < max_age
    }
}

fn logged<T>(result: ClubResult<T>, action: &str) -> ClubResult<T> {
    if let Err(e) = &result {
        error!("Error {}: {}", action, e);
    }
    result
}

pub struct ClubService {
    store: Arc<dyn MeetupStore>,
    projector: Projector,
    roster: RwLock<Option<CachedRoster>>,
    roster_max_age: Duration,
}

impl ClubService {
    pub fn new(store: Arc<dyn MeetupStore>, projector: Projector) -> Self {
        Self {
            store,
            projector,
            roster: RwLock::new(None),
            roster_max_age: DEFAULT_ROSTER_MAX_AGE,
        }
    }

    /// Reload the roster once a snapshot is older than `max_age`, even if
    /// nothing in this process changed a member.
    pub fn with_roster_max_age(mut self, max_age: Duration) -> Self {
        self.roster_max_age = max_age;
        self
    }

    pub fn store(&self) -> &dyn MeetupStore {
        self.store.as_ref()
    }

    /// Current roster snapshot. Reloads when invalidated or expired; if the
    /// reload fails the previous snapshot (or an empty one) is served instead.
    pub async fn roster(&self) -> Arc<Roster> {
        if let Some(cached) = self.roster.read().await.as_ref() {
            if cached.is_current(self.roster_max_age) {
                return cached.roster.clone();
            }
        }

        let mut slot = self.roster.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.is_current(self.roster_max_age) {
                return cached.roster.clone();
            }
        }
        match self.store.list_members().await {
            Ok(members) => {
                let roster = Arc::new(Roster::from_members(members));
                *slot = Some(CachedRoster {
                    roster: roster.clone(),
                    fresh: true,
                    loaded_at: Instant::now(),
                });
                roster
            }
            Err(e) => {
                warn!("Roster refresh failed, using last snapshot: {}", e);
                slot.as_ref()
                    .map(|c| c.roster.clone())
                    .unwrap_or_else(|| Arc::new(Roster::empty()))
            }
        }
    }

    pub async fn invalidate_roster(&self) {
        if let Some(cached) = self.roster.write().await.as_mut() {
            cached.fresh = false;
        }
    }

    pub async fn calendar(&self) -> ClubResult<Projection> {
        let meetups = logged(self.store.list_meetups().await, "loading meetups")?;
        let roster = self.roster().await;
        Ok(self.projector.project(&meetups, &roster))
    }

    pub async fn meetup_events(&self, filter: &MeetupFilter) -> ClubResult<Vec<CalendarEvent>> {
        let projection = self.calendar().await?;
        Ok(filter.apply(&projection.events).into_iter().cloned().collect())
    }

    pub async fn create_meetup(&self, form: MeetupForm) -> ClubResult<MeetupSaved> {
        let validated = validate_meetup(form)?;
        let meetup = logged(
            self.store.create_meetup(&validated.draft).await,
            "saving meetup",
        )?;
        info!("Meetup {} created for {}", meetup.id, validated.draft.date);

        let mut saved = MeetupSaved {
            meetup,
            attendees: None,
            attendee_warning: None,
        };
        if let Some(desired) = validated.attendees.filter(|d| !d.is_empty()) {
            // Nothing exists for a brand-new meetup, so no fetch is needed
            let plan = reconcile::plan(saved.meetup.id, &[], &desired);
            let report = reconcile::apply(self.store.as_ref(), plan).await;
            saved.attendee_warning = attendee_warning(&report);
            saved.attendees = Some(report);
        }
        Ok(saved)
    }

    pub async fn update_meetup(&self, id: MeetupId, form: MeetupForm) -> ClubResult<MeetupSaved> {
        let validated = validate_meetup(form)?;
        let meetup = logged(
            self.store.update_meetup(id, &validated.draft).await,
            "saving meetup",
        )?;
        info!("Meetup {} updated", id);

        let mut saved = MeetupSaved {
            meetup,
            attendees: None,
            attendee_warning: None,
        };
        if let Some(desired) = validated.attendees {
            match reconcile::reconcile(self.store.as_ref(), id, &desired).await {
                Ok(report) => {
                    saved.attendee_warning = attendee_warning(&report);
                    saved.attendees = Some(report);
                }
                Err(e) => {
                    // The meetup write stands; attendees catch up on the next edit
                    error!("Error updating attendees for meetup {}: {}", id, e);
                    saved.attendee_warning = Some(format!("Attendees were not updated: {}", e));
                }
            }
        }
        Ok(saved)
    }

    /// Removes the meetup's attendee links first, then the meetup. If any
    /// link survives, the meetup is kept.
    pub async fn delete_meetup(&self, id: MeetupId) -> ClubResult<()> {
        let report = logged(
            reconcile::reconcile(self.store.as_ref(), id, &HashSet::new()).await,
            "loading attendees",
        )?;
        logged(report.into_result(), "removing attendees")?;
        logged(self.store.delete_meetup(id).await, "deleting meetup")?;
        info!("Meetup {} deleted", id);
        Ok(())
    }

    pub async fn attendees(&self, meetup_id: MeetupId) -> ClubResult<Vec<Attendee>> {
        let links = logged(
            self.store.list_attendees(Some(meetup_id)).await,
            "loading attendees",
        )?;
        let roster = self.roster().await;
        let refs: Vec<AttendeeRef> = links.into_iter().map(AttendeeRef::from).collect();
        Ok(normalize_attendees(&refs, &roster))
    }

    /// Reconcile only. Unlike a meetup save, a partial failure here is the
    /// caller's error.
    pub async fn set_attendees(
        &self,
        meetup_id: MeetupId,
        desired: &HashSet<MemberId>,
    ) -> ClubResult<ReconcileReport> {
        let report = logged(
            reconcile::reconcile(self.store.as_ref(), meetup_id, desired).await,
            "loading attendees",
        )?;
        logged(report.into_result(), "updating attendees")
    }

    pub async fn update_attendee_payment(
        &self,
        link_id: AttendeeLinkId,
        payment: AttendeePayment,
    ) -> ClubResult<AttendeeLink> {
        let payment = validate_payment(payment)?;
        let link = logged(
            self.store.update_attendee(link_id, &payment).await,
            "updating attendee",
        )?;
        info!("Attendee link {} payment updated", link_id);
        Ok(link)
    }

    pub async fn list_members(&self) -> ClubResult<Vec<Member>> {
        logged(self.store.list_members().await, "loading members")
    }

    pub async fn search_members(&self, query: &str) -> ClubResult<Vec<Member>> {
        let members = self.list_members().await?;
        let query = TextQuery::everywhere(query);
        Ok(members.into_iter().filter(|m| query.matches(m)).collect())
    }

    pub async fn suggest_members(&self, input: &str) -> Vec<MemberOption> {
        search::suggest_members(&*self.roster().await, input)
    }

    pub async fn create_member(&self, draft: MemberDraft) -> ClubResult<Member> {
        let draft = validate_member(draft)?;
        let member = logged(self.store.create_member(&draft).await, "saving member")?;
        self.invalidate_roster().await;
        info!("Member {} ({}) created", member.id, member.nickname);
        Ok(member)
    }

    pub async fn update_member(&self, id: MemberId, draft: MemberDraft) -> ClubResult<Member> {
        let draft = validate_member(draft)?;
        let member = logged(self.store.update_member(id, &draft).await, "updating member")?;
        self.invalidate_roster().await;
        info!("Member {} updated", id);
        Ok(member)
    }

    pub async fn delete_member(&self, id: MemberId) -> ClubResult<()> {
        logged(self.store.delete_member(id).await, "deleting member")?;
        self.invalidate_roster().await;
        info!("Member {} deleted", id);
        Ok(())
    }
}

fn attendee_warning(report: &ReconcileReport) -> Option<String> {
    if report.is_clean() {
        return None;
    }
    let members: Vec<String> = report
        .failures
        .iter()
        .map(|f| format!("{}{}", f.op, f.member_id))
        .collect();
    Some(format!(
        "{} of {} attendee changes failed ({})",
        report.failures.len(),
        report.attempted(),
        members.join(", ")
    ))
}
