use super::attendee::AttendeeRef;
use super::ids::{MeetupId, MemberId};
use super::wire::{lenient_date, lenient_enum, lenient_time, nullable};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a meetup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetupStatus {
    #[default]
    #[serde(alias = "진행 전")]
    Pending,
    #[serde(alias = "완료")]
    Completed,
    #[serde(alias = "canceled", alias = "취소")]
    Cancelled,
}

impl MeetupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetupStatus::Pending => "pending",
            MeetupStatus::Completed => "completed",
            MeetupStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MeetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MeetupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "진행 전" => Ok(MeetupStatus::Pending),
            "completed" | "완료" => Ok(MeetupStatus::Completed),
            "cancelled" | "canceled" | "취소" => Ok(MeetupStatus::Cancelled),
            other => Err(format!("Unknown meetup status: {}", other)),
        }
    }
}

/// Activity type. Open ended: the set of known types and their colours comes
/// from configuration, so any string is accepted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityType(pub String);

impl ActivityType {
    pub fn new(value: impl Into<String>) -> Self {
        ActivityType(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A meetup row as the storage collaborator returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meetup {
    pub id: MeetupId,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    pub place: Option<String>,
    pub course: Option<String>,
    pub leader_member_id: Option<MemberId>,
    pub leader_nickname: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sub_leader_member_ids: Vec<MemberId>,
    pub description: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub activity_type: ActivityType,
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub status: MeetupStatus,
    pub cancel_reason: Option<String>,
    pub review: Option<String>,
    #[serde(
        rename = "meetup_attendees",
        alias = "attendees",
        default,
        deserialize_with = "nullable"
    )]
    pub attendees: Vec<AttendeeRef>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_amount: i64,
}

impl Meetup {
    pub fn is_cancelled(&self) -> bool {
        self.status == MeetupStatus::Cancelled
    }
}

/// Validated meetup payload sent on create and update. Attendees travel
/// separately through reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetupDraft {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub title: String,
    pub place: Option<String>,
    pub course: Option<String>,
    pub leader_member_id: Option<MemberId>,
    pub leader_nickname: Option<String>,
    pub sub_leader_member_ids: Vec<MemberId>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub level: Option<String>,
    pub status: MeetupStatus,
    pub cancel_reason: Option<String>,
    pub review: Option<String>,
    pub total_amount: i64,
}

impl MeetupDraft {
    /// Materialize the draft as a stored row (used by stores that assign ids
    /// locally).
    pub fn into_meetup(self, id: MeetupId) -> Meetup {
        Meetup {
            id,
            date: Some(self.date),
            start_time: self.start_time,
            end_time: self.end_time,
            title: self.title,
            place: self.place,
            course: self.course,
            leader_member_id: self.leader_member_id,
            leader_nickname: self.leader_nickname,
            sub_leader_member_ids: self.sub_leader_member_ids,
            description: self.description,
            activity_type: self.activity_type,
            level: self.level,
            status: self.status,
            cancel_reason: self.cancel_reason,
            review: self.review,
            attendees: Vec::new(),
            total_amount: self.total_amount,
        }
    }
}

/// Raw meetup form input, before validation.
///
/// `attendees: None` means the form did not touch the attendee list; an
/// empty list means "remove everyone".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetupForm {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub title: Option<String>,
    pub place: Option<String>,
    pub course: Option<String>,
    #[serde(alias = "leader_id")]
    pub leader_member_id: Option<MemberId>,
    pub leader_nickname: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sub_leader_member_ids: Vec<MemberId>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub level: Option<String>,
    pub status: Option<MeetupStatus>,
    pub cancel_reason: Option<String>,
    pub review: Option<String>,
    pub total_amount: Option<i64>,
    pub attendees: Option<Vec<AttendeeRef>>,
}
