//! Storage collaborator interface.
//!
//! Every failure, transport or validation on the remote side, surfaces as
//! `ClubError::Remote` carrying a message.

pub mod memory;
pub mod rest;

use crate::error::ClubResult;
use crate::models::{
    AttendeeLink, AttendeeLinkId, AttendeePayment, Meetup, MeetupDraft, MeetupId, Member,
    MemberDraft, MemberId, NewAttendeeLink,
};
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use rest::RestStore;

#[async_trait]
pub trait MeetupStore: Send + Sync {
    /// All meetups, sorted by date ascending
    async fn list_meetups(&self) -> ClubResult<Vec<Meetup>>;

    async fn create_meetup(&self, draft: &MeetupDraft) -> ClubResult<Meetup>;

    async fn update_meetup(&self, id: MeetupId, draft: &MeetupDraft) -> ClubResult<Meetup>;

    async fn delete_meetup(&self, id: MeetupId) -> ClubResult<()>;

    /// Attendee links, restricted to one meetup when `meetup_id` is given
    async fn list_attendees(&self, meetup_id: Option<MeetupId>) -> ClubResult<Vec<AttendeeLink>>;

    async fn create_attendee(&self, link: &NewAttendeeLink) -> ClubResult<AttendeeLink>;

    async fn update_attendee(
        &self,
        id: AttendeeLinkId,
        payment: &AttendeePayment,
    ) -> ClubResult<AttendeeLink>;

    async fn delete_attendee(&self, id: AttendeeLinkId) -> ClubResult<()>;

    async fn list_members(&self) -> ClubResult<Vec<Member>>;

    async fn create_member(&self, draft: &MemberDraft) -> ClubResult<Member>;

    async fn update_member(&self, id: MemberId, draft: &MemberDraft) -> ClubResult<Member>;

    async fn delete_member(&self, id: MemberId) -> ClubResult<()>;
}

/// Date ascending; undated rows last, ties broken by start time then id.
pub(crate) fn sort_by_date(meetups: &mut [Meetup]) {
    meetups.sort_by(|a, b| {
        let key = |m: &Meetup| (m.date.is_none(), m.date, m.start_time, m.id);
        key(a).cmp(&key(b))
    });
}
