//! In-process store for local runs and tests.

use super::{sort_by_date, MeetupStore};
use crate::error::{ClubError, ClubResult};
use crate::models::{
    AttendeeLink, AttendeeLinkId, AttendeePayment, AttendeeRef, EmbeddedMember, Meetup,
    MeetupDraft, MeetupId, Member, MemberDraft, MemberId, NewAttendeeLink,
};
use async_trait::async_trait;
use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    meetups: BTreeMap<MeetupId, Meetup>,
    links: BTreeMap<AttendeeLinkId, AttendeeLink>,
    members: BTreeMap<MemberId, Member>,
    failing_members: HashSet<MemberId>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn with_nickname(&self, mut link: AttendeeLink) -> AttendeeLink {
        link.members = self.members.get(&link.member_id).map(|m| EmbeddedMember {
            nickname: Some(m.nickname.clone()),
        });
        link
    }
}

/// Behaves like the hosted tables: ids are assigned on insert, meetup
/// listings embed their attendee join rows, and (meetup, member) pairs are
/// unique.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClubResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ClubError::remote("Memory store", "state lock poisoned"))
    }

    /// Make every attendee insert or delete touching `member_id` fail, to
    /// exercise partial batch handling.
    pub fn fail_writes_for(&self, member_id: MemberId) -> ClubResult<()> {
        self.lock()?.failing_members.insert(member_id);
        Ok(())
    }

    pub fn clear_failures(&self) -> ClubResult<()> {
        self.lock()?.failing_members.clear();
        Ok(())
    }
}

#[async_trait]
impl MeetupStore for MemoryStore {
    async fn list_meetups(&self) -> ClubResult<Vec<Meetup>> {
        let state = self.lock()?;
        let mut meetups: Vec<Meetup> = state
            .meetups
            .values()
            .cloned()
            .map(|mut meetup| {
                meetup.attendees = state
                    .links
                    .values()
                    .filter(|l| l.meetup_id == meetup.id)
                    .map(|l| AttendeeRef::from(state.with_nickname(l.clone())))
                    .collect();
                meetup
            })
            .collect();
        sort_by_date(&mut meetups);
        Ok(meetups)
    }

    async fn create_meetup(&self, draft: &MeetupDraft) -> ClubResult<Meetup> {
        let mut state = self.lock()?;
        let id = MeetupId(state.next_id());
        let meetup = draft.clone().into_meetup(id);
        state.meetups.insert(id, meetup.clone());
        debug!("Memory store: created meetup {}", id);
        Ok(meetup)
    }

    async fn update_meetup(&self, id: MeetupId, draft: &MeetupDraft) -> ClubResult<Meetup> {
        let mut state = self.lock()?;
        if !state.meetups.contains_key(&id) {
            return Err(ClubError::remote("Update meetup", format!("meetup {} not found", id)));
        }
        let meetup = draft.clone().into_meetup(id);
        state.meetups.insert(id, meetup.clone());
        Ok(meetup)
    }

    async fn delete_meetup(&self, id: MeetupId) -> ClubResult<()> {
        let mut state = self.lock()?;
        if state.links.values().any(|l| l.meetup_id == id) {
            return Err(ClubError::remote(
                "Delete meetup",
                format!("meetup {} still has attendee links", id),
            ));
        }
        state
            .meetups
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ClubError::remote("Delete meetup", format!("meetup {} not found", id)))
    }

    async fn list_attendees(&self, meetup_id: Option<MeetupId>) -> ClubResult<Vec<AttendeeLink>> {
        let state = self.lock()?;
        Ok(state
            .links
            .values()
            .filter(|l| meetup_id.map_or(true, |id| l.meetup_id == id))
            .map(|l| state.with_nickname(l.clone()))
            .collect())
    }

    async fn create_attendee(&self, link: &NewAttendeeLink) -> ClubResult<AttendeeLink> {
        let mut state = self.lock()?;
        if state.failing_members.contains(&link.member_id) {
            return Err(ClubError::remote(
                "Add attendee",
                format!("insert rejected for member {}", link.member_id),
            ));
        }
        if !state.meetups.contains_key(&link.meetup_id) {
            return Err(ClubError::remote(
                "Add attendee",
                format!("meetup {} not found", link.meetup_id),
            ));
        }
        if state
            .links
            .values()
            .any(|l| l.meetup_id == link.meetup_id && l.member_id == link.member_id)
        {
            return Err(ClubError::remote(
                "Add attendee",
                format!(
                    "member {} already attends meetup {}",
                    link.member_id, link.meetup_id
                ),
            ));
        }

        let id = AttendeeLinkId(state.next_id());
        let created = AttendeeLink {
            id,
            meetup_id: link.meetup_id,
            member_id: link.member_id,
            donation_paid: link.donation_paid,
            donation_amount: link.donation_amount,
            members: None,
        };
        state.links.insert(id, created.clone());
        Ok(state.with_nickname(created))
    }

    async fn update_attendee(
        &self,
        id: AttendeeLinkId,
        payment: &AttendeePayment,
    ) -> ClubResult<AttendeeLink> {
        let mut state = self.lock()?;
        let link = state
            .links
            .get_mut(&id)
            .ok_or_else(|| ClubError::remote("Update attendee", format!("link {} not found", id)))?;
        link.donation_paid = payment.donation_paid;
        link.donation_amount = payment.donation_amount;
        let updated = link.clone();
        Ok(state.with_nickname(updated))
    }

    async fn delete_attendee(&self, id: AttendeeLinkId) -> ClubResult<()> {
        let mut state = self.lock()?;
        let member_id = state
            .links
            .get(&id)
            .map(|l| l.member_id)
            .ok_or_else(|| ClubError::remote("Remove attendee", format!("link {} not found", id)))?;
        if state.failing_members.contains(&member_id) {
            return Err(ClubError::remote(
                "Remove attendee",
                format!("delete rejected for member {}", member_id),
            ));
        }
        state.links.remove(&id);
        Ok(())
    }

    async fn list_members(&self) -> ClubResult<Vec<Member>> {
        Ok(self.lock()?.members.values().cloned().collect())
    }

    async fn create_member(&self, draft: &MemberDraft) -> ClubResult<Member> {
        let mut state = self.lock()?;
        let id = MemberId(state.next_id());
        let member = draft
            .clone()
            .into_member(id, Some(chrono::Local::now().to_rfc3339()));
        state.members.insert(id, member.clone());
        Ok(member)
    }

    async fn update_member(&self, id: MemberId, draft: &MemberDraft) -> ClubResult<Member> {
        let mut state = self.lock()?;
        let created_at = state
            .members
            .get(&id)
            .ok_or_else(|| ClubError::remote("Update member", format!("member {} not found", id)))?
            .created_at
            .clone();
        let member = draft.clone().into_member(id, created_at);
        state.members.insert(id, member.clone());
        Ok(member)
    }

    async fn delete_member(&self, id: MemberId) -> ClubResult<()> {
        self.lock()?
            .members
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ClubError::remote("Delete member", format!("member {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityType, MeetupStatus};
    use chrono::NaiveDate;

    fn draft(date: &str, title: &str) -> MeetupDraft {
        MeetupDraft {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            start_time: None,
            end_time: None,
            title: title.to_string(),
            place: None,
            course: None,
            leader_member_id: None,
            leader_nickname: None,
            sub_leader_member_ids: vec![],
            description: None,
            activity_type: ActivityType::new("hiking"),
            level: None,
            status: MeetupStatus::Pending,
            cancel_reason: None,
            review: None,
            total_amount: 0,
        }
    }

    #[tokio::test]
    async fn test_meetups_listed_by_date_with_join_rows() {
        let store = MemoryStore::new();
        let later = store.create_meetup(&draft("2025-06-01", "Later")).await.unwrap();
        let sooner = store.create_meetup(&draft("2025-05-01", "Sooner")).await.unwrap();
        let hawk = store
            .create_member(&MemberDraft {
                nickname: "Hawk".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_attendee(&NewAttendeeLink::fresh(later.id, hawk.id))
            .await
            .unwrap();

        let meetups = store.list_meetups().await.unwrap();
        assert_eq!(meetups[0].id, sooner.id);
        assert_eq!(meetups[1].id, later.id);
        match &meetups[1].attendees[0] {
            AttendeeRef::LinkRow(row) => assert_eq!(row.embedded_nickname(), Some("Hawk")),
            other => panic!("expected join row, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_link_rejected() {
        let store = MemoryStore::new();
        let meetup = store.create_meetup(&draft("2025-05-01", "Walk")).await.unwrap();
        let link = NewAttendeeLink::fresh(meetup.id, MemberId(42));
        store.create_attendee(&link).await.unwrap();
        assert!(store.create_attendee(&link).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        let meetup = store.create_meetup(&draft("2025-05-01", "Walk")).await.unwrap();
        store.fail_writes_for(MemberId(7)).unwrap();
        let err = store
            .create_attendee(&NewAttendeeLink::fresh(meetup.id, MemberId(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::Remote { .. }));

        store.clear_failures().unwrap();
        assert!(store
            .create_attendee(&NewAttendeeLink::fresh(meetup.id, MemberId(7)))
            .await
            .is_ok());
    }
}
