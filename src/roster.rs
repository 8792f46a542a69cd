//! Read-only member snapshot used for nickname resolution.

use crate::models::{Member, MemberId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: HashMap<MemberId, Member>,
}

impl Roster {
    /// A roster that has not been loaded yet. Every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_members(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in id order
    pub fn members(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.id);
        members
    }

    /// Display nickname for a member, `#<id>` when the member is unknown
    /// (deleted, or the roster is not loaded yet).
    pub fn nickname_for(&self, id: MemberId) -> String {
        self.members
            .get(&id)
            .map(|m| m.nickname.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_nickname(id))
    }
}

pub fn placeholder_nickname(id: MemberId) -> String {
    format!("#{}", id)
}
