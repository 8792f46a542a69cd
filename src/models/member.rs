use super::ids::MemberId;
use super::wire::nullable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
}

/// A roster member. Members outlive any meetup they attend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(default, deserialize_with = "nullable")]
    pub nickname: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub child_name: Option<String>,
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: MemberStatus,
    pub created_at: Option<String>,
}

/// Member create/update payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemberDraft {
    #[serde(default, deserialize_with = "nullable")]
    pub nickname: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub child_name: Option<String>,
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: MemberStatus,
}

impl MemberDraft {
    pub fn into_member(self, id: MemberId, created_at: Option<String>) -> Member {
        Member {
            id,
            nickname: self.nickname,
            name: self.name,
            email: self.email,
            phone: self.phone,
            region: self.region,
            child_name: self.child_name,
            handle: self.handle,
            status: self.status,
            created_at,
        }
    }
}
