use super::ids::{AttendeeLinkId, MeetupId, MemberId};
use super::wire::nullable;
use serde::{Deserialize, Serialize};

/// Member fields a storage join may embed in an attendee row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmbeddedMember {
    pub nickname: Option<String>,
}

/// Attendee row as carried inside a meetup or posted by a form.
///
/// Accepts both the storage join shape (`member_id`, `donation_paid`,
/// nested `members.nickname`) and the form shape (`memberId`,
/// `donationPaid`, flat `nickname`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRow {
    pub id: Option<AttendeeLinkId>,
    #[serde(alias = "memberId")]
    pub member_id: MemberId,
    #[serde(default, alias = "donationPaid", deserialize_with = "nullable")]
    pub donation_paid: bool,
    #[serde(default, alias = "donationAmount", deserialize_with = "nullable")]
    pub donation_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<EmbeddedMember>,
}

impl LinkRow {
    pub fn embedded_nickname(&self) -> Option<&str> {
        self.nickname
            .as_deref()
            .or_else(|| self.members.as_ref().and_then(|m| m.nickname.as_deref()))
            .filter(|n| !n.trim().is_empty())
    }
}

/// An attendee reference in whichever shape the collaborator returned it:
/// a bare member id, or a join row with payment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttendeeRef {
    Id(MemberId),
    LinkRow(LinkRow),
}

impl AttendeeRef {
    pub fn member_id(&self) -> MemberId {
        match self {
            AttendeeRef::Id(id) => *id,
            AttendeeRef::LinkRow(row) => row.member_id,
        }
    }
}

impl From<MemberId> for AttendeeRef {
    fn from(id: MemberId) -> Self {
        AttendeeRef::Id(id)
    }
}

/// A persisted meetup/member link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeLink {
    pub id: AttendeeLinkId,
    pub meetup_id: MeetupId,
    pub member_id: MemberId,
    #[serde(default, deserialize_with = "nullable")]
    pub donation_paid: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub donation_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<EmbeddedMember>,
}

impl AttendeeLink {
    pub fn embedded_nickname(&self) -> Option<&str> {
        self.members
            .as_ref()
            .and_then(|m| m.nickname.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

impl From<AttendeeLink> for AttendeeRef {
    fn from(link: AttendeeLink) -> Self {
        AttendeeRef::LinkRow(LinkRow {
            id: Some(link.id),
            member_id: link.member_id,
            donation_paid: link.donation_paid,
            donation_amount: link.donation_amount,
            nickname: None,
            members: link.members,
        })
    }
}

/// Insert payload for a new link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttendeeLink {
    pub meetup_id: MeetupId,
    pub member_id: MemberId,
    pub donation_paid: bool,
    pub donation_amount: i64,
}

impl NewAttendeeLink {
    /// A link nobody has paid on yet
    pub fn fresh(meetup_id: MeetupId, member_id: MemberId) -> Self {
        Self {
            meetup_id,
            member_id,
            donation_paid: false,
            donation_amount: 0,
        }
    }
}

/// Payment fields of an existing link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendeePayment {
    pub donation_paid: bool,
    #[serde(default)]
    pub donation_amount: i64,
}

/// Uniform attendee shape handed to views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attendee {
    pub id: Option<AttendeeLinkId>,
    pub member_id: MemberId,
    pub nickname: String,
    pub donation_paid: bool,
    pub donation_amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_both_join_shapes() {
        let refs: Vec<AttendeeRef> = serde_json::from_value(json!([
            7,
            "8",
            {
                "id": 3,
                "member_id": 9,
                "donation_paid": true,
                "donation_amount": 5000,
                "members": { "nickname": "Hawk" }
            },
            { "memberId": 10, "nickname": "Owl", "donationPaid": false }
        ]))
        .unwrap();

        assert_eq!(refs[0], AttendeeRef::Id(MemberId(7)));
        assert_eq!(refs[1], AttendeeRef::Id(MemberId(8)));
        match &refs[2] {
            AttendeeRef::LinkRow(row) => {
                assert_eq!(row.id, Some(AttendeeLinkId(3)));
                assert_eq!(row.embedded_nickname(), Some("Hawk"));
                assert!(row.donation_paid);
                assert_eq!(row.donation_amount, 5000);
            }
            other => panic!("expected link row, got {:?}", other),
        }
        assert_eq!(refs[3].member_id(), MemberId(10));
    }

    #[test]
    fn test_fresh_link_defaults() {
        let link = NewAttendeeLink::fresh(MeetupId(1), MemberId(2));
        assert!(!link.donation_paid);
        assert_eq!(link.donation_amount, 0);
    }
}
