//! Client-side filtering over already-fetched meetups and members.

use crate::calendar::CalendarEvent;
use crate::error::{ClubError, ClubResult};
use crate::models::{ActivityType, Meetup, MeetupStatus, Member, MemberId};
use crate::roster::Roster;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Meetup list filter. Every category ANDs with the others; an empty text
/// or empty selection does not filter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MeetupFilter {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default)]
    pub types: Vec<ActivityType>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<MeetupStatus>,
    /// Inclusive on both ends
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl MeetupFilter {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.leader.trim().is_empty()
            && self.types.is_empty()
            && self.levels.is_empty()
            && self.statuses.is_empty()
            && self.date_range.is_none()
    }

    pub fn matches(&self, meetup: &Meetup) -> bool {
        let title = self.title.trim().to_lowercase();
        if !title.is_empty() && !contains_ci(&meetup.title, &title) {
            return false;
        }

        let leader = self.leader.trim().to_lowercase();
        if !leader.is_empty()
            && !meetup
                .leader_nickname
                .as_deref()
                .is_some_and(|n| contains_ci(n, &leader))
        {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(&meetup.activity_type) {
            return false;
        }

        if !self.levels.is_empty()
            && !meetup
                .level
                .as_ref()
                .is_some_and(|level| self.levels.contains(level))
        {
            return false;
        }

        if !self.statuses.is_empty() && !self.statuses.contains(&meetup.status) {
            return false;
        }

        if let Some((from, to)) = self.date_range {
            match meetup.date {
                Some(date) if date >= from && date <= to => {}
                _ => return false,
            }
        }

        true
    }

    pub fn apply<'a>(&self, events: &'a [CalendarEvent]) -> Vec<&'a CalendarEvent> {
        events.iter().filter(|e| self.matches(&e.resource)).collect()
    }
}

/// Filter as it arrives from a query string or the command line: plain
/// text, comma separated selections, optional date bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetupQuery {
    pub title: Option<String>,
    pub leader: Option<String>,
    #[serde(rename = "type")]
    pub types: Option<String>,
    #[serde(rename = "level")]
    pub levels: Option<String>,
    #[serde(rename = "status")]
    pub statuses: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bound(field: &'static str, raw: Option<&str>) -> ClubResult<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ClubError::validation(field, format!("'{}' is not a YYYY-MM-DD date", s))),
    }
}

impl MeetupQuery {
    /// A single bound leaves the other end open.
    pub fn into_filter(self) -> ClubResult<MeetupFilter> {
        let statuses = split_list(self.statuses.as_deref())
            .iter()
            .map(|s| s.parse().map_err(|e: String| ClubError::validation("status", e)))
            .collect::<ClubResult<Vec<MeetupStatus>>>()?;

        let from = parse_bound("from", self.from.as_deref())?;
        let to = parse_bound("to", self.to.as_deref())?;
        let date_range = match (from, to) {
            (None, None) => None,
            (from, to) => {
                let from = from.unwrap_or(NaiveDate::MIN);
                let to = to.unwrap_or(NaiveDate::MAX);
                if from > to {
                    return Err(ClubError::validation("to", "End date is before start date"));
                }
                Some((from, to))
            }
        };

        Ok(MeetupFilter {
            title: self.title.unwrap_or_default(),
            leader: self.leader.unwrap_or_default(),
            types: split_list(self.types.as_deref())
                .into_iter()
                .map(ActivityType)
                .collect(),
            levels: split_list(self.levels.as_deref()),
            statuses,
            date_range,
        })
    }
}

/// Searchable member text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberField {
    Nickname,
    Name,
    Email,
    Phone,
    Region,
    ChildName,
    Handle,
}

impl MemberField {
    pub const ALL: [MemberField; 7] = [
        MemberField::Nickname,
        MemberField::Name,
        MemberField::Email,
        MemberField::Phone,
        MemberField::Region,
        MemberField::ChildName,
        MemberField::Handle,
    ];

    fn value<'a>(&self, member: &'a Member) -> Option<&'a str> {
        match self {
            MemberField::Nickname => Some(member.nickname.as_str()),
            MemberField::Name => member.name.as_deref(),
            MemberField::Email => member.email.as_deref(),
            MemberField::Phone => member.phone.as_deref(),
            MemberField::Region => member.region.as_deref(),
            MemberField::ChildName => member.child_name.as_deref(),
            MemberField::Handle => member.handle.as_deref(),
        }
    }
}

/// Case-insensitive substring search, OR across `fields`
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub needle: String,
    pub fields: Vec<MemberField>,
}

impl TextQuery {
    pub fn new(needle: impl Into<String>, fields: &[MemberField]) -> Self {
        Self {
            needle: needle.into(),
            fields: fields.to_vec(),
        }
    }

    /// Search every member field
    pub fn everywhere(needle: impl Into<String>) -> Self {
        Self::new(needle, &MemberField::ALL)
    }

    pub fn matches(&self, member: &Member) -> bool {
        let needle = self.needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.fields
            .iter()
            .filter_map(|f| f.value(member))
            .any(|v| contains_ci(v, &needle))
    }

    pub fn apply<'a>(&self, members: &'a [Member]) -> Vec<&'a Member> {
        members.iter().filter(|m| self.matches(m)).collect()
    }
}

/// One autocomplete entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberOption {
    pub value: String,
    pub label: String,
    pub member_id: MemberId,
}

/// Members whose nickname contains `input`, in id order. Blank input yields
/// nothing rather than the whole roster.
pub fn suggest_members(roster: &Roster, input: &str) -> Vec<MemberOption> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    roster
        .members()
        .into_iter()
        .filter(|m| !m.nickname.is_empty() && contains_ci(&m.nickname, &needle))
        .map(|m| MemberOption {
            value: m.nickname.clone(),
            label: m.nickname.clone(),
            member_id: m.id,
        })
        .collect()
}

pub fn find_member_id_by_nickname(roster: &Roster, nickname: &str) -> Option<MemberId> {
    suggest_members(roster, nickname).first().map(|o| o.member_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tests::member;
    use serde_json::json;
    use test_case::test_case;

    fn meetups() -> Vec<Meetup> {
        serde_json::from_value(json!([
            { "id": 1, "date": "2025-03-01", "title": "Ridge Hike", "leader_nickname": "Hawk",
              "type": "hiking", "level": "advanced", "status": "completed" },
            { "id": 2, "date": "2025-03-08", "title": "River walk", "leader_nickname": "Owl",
              "type": "walk", "level": "beginner", "status": "pending" },
            { "id": 3, "date": "2025-03-15", "title": "Night hike", "leader_nickname": "hawkeye",
              "type": "hiking", "status": "cancelled" },
            { "id": 4, "title": "Undated hike", "type": "hiking" }
        ]))
        .unwrap()
    }

    fn matching(filter: &MeetupFilter) -> Vec<i64> {
        meetups()
            .iter()
            .filter(|m| filter.matches(m))
            .map(|m| m.id.0)
            .collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = MeetupFilter::default();
        assert!(filter.is_empty());
        assert_eq!(matching(&filter), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_title_and_leader_case_insensitive() {
        let filter = MeetupFilter {
            title: "HIKE".to_string(),
            leader: "hawk".to_string(),
            ..Default::default()
        };
        assert_eq!(matching(&filter), vec![1, 3]);
    }

    #[test]
    fn test_multi_select_categories_and_together() {
        let filter = MeetupFilter {
            types: vec![ActivityType::new("hiking")],
            statuses: vec![MeetupStatus::Completed, MeetupStatus::Cancelled],
            ..Default::default()
        };
        assert_eq!(matching(&filter), vec![1, 3]);

        let filter = MeetupFilter {
            levels: vec!["beginner".to_string()],
            ..Default::default()
        };
        assert_eq!(matching(&filter), vec![2]);
    }

    #[test_case("2025-03-01", "2025-03-08", &[1, 2] ; "inclusive bounds")]
    #[test_case("2025-03-09", "2025-03-14", &[] ; "gap")]
    #[test_case("2025-03-15", "2025-03-15", &[3] ; "single day")]
    fn test_date_range(from: &str, to: &str, expected: &[i64]) {
        let filter = MeetupFilter {
            date_range: Some((date(from), date(to))),
            ..Default::default()
        };
        assert_eq!(matching(&filter), expected.to_vec());
    }

    #[test]
    fn test_query_into_filter() {
        let query = MeetupQuery {
            types: Some("hiking, walk,".to_string()),
            statuses: Some("canceled".to_string()),
            from: Some("2025-03-10".to_string()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(
            filter.types,
            vec![ActivityType::new("hiking"), ActivityType::new("walk")]
        );
        assert_eq!(filter.statuses, vec![MeetupStatus::Cancelled]);
        assert_eq!(filter.date_range, Some((date("2025-03-10"), NaiveDate::MAX)));
        assert_eq!(matching(&filter), vec![3]);
    }

    #[test_case(MeetupQuery { statuses: Some("archived".into()), ..Default::default() }, "status" ; "unknown status")]
    #[test_case(MeetupQuery { from: Some("03/10/2025".into()), ..Default::default() }, "from" ; "bad date")]
    #[test_case(MeetupQuery { from: Some("2025-03-10".into()), to: Some("2025-03-01".into()), ..Default::default() }, "to" ; "inverted range")]
    fn test_query_rejects(query: MeetupQuery, expected_field: &str) {
        match query.into_filter() {
            Err(ClubError::Validation { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_member_text_query_or_across_fields() {
        let mut hawk = member(1, "Hawk");
        hawk.region = Some("Seoul".to_string());
        let mut owl = member(2, "Owl");
        owl.name = Some("Kim Seo-yeon".to_string());
        let members = vec![hawk, owl, member(3, "Fox")];

        let query = TextQuery::new("seo", &[MemberField::Region, MemberField::Name]);
        let ids: Vec<_> = query.apply(&members).iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2]);

        let query = TextQuery::new("seo", &[MemberField::Nickname]);
        assert!(query.apply(&members).is_empty());

        assert_eq!(TextQuery::everywhere("").apply(&members).len(), 3);
    }

    #[test]
    fn test_suggest_members() {
        let roster = Roster::from_members(vec![
            member(3, "Hawkeye"),
            member(1, "Hawk"),
            member(2, "Owl"),
        ]);
        let options = suggest_members(&roster, "hawk");
        let ids: Vec<_> = options.iter().map(|o| o.member_id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(options[0].label, "Hawk");

        assert!(suggest_members(&roster, "  ").is_empty());
        assert_eq!(find_member_id_by_nickname(&roster, "owl"), Some(MemberId(2)));
        assert_eq!(find_member_id_by_nickname(&roster, "eagle"), None);
    }
}
