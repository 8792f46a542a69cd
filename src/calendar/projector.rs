//! Projection of stored meetups into calendar-displayable intervals.

use crate::error::{ClubError, ClubResult};
use crate::models::{Attendee, AttendeeRef, Meetup, MeetupId};
use crate::roster::Roster;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_START_TIME: &str = "09:00:00";
pub const DEFAULT_DURATION_MINUTES: i64 = 60;
/// A meetup never runs past a full day
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// A meetup placed on the calendar. Rebuilt on every projection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: MeetupId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    pub attendees: Vec<Attendee>,
    pub resource: Meetup,
}

/// A record the projector had to leave off the calendar
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionError {
    #[error("Meetup {meetup_id} has no date")]
    MissingDate { meetup_id: MeetupId },

    #[error("Meetup {meetup_id} ends outside the representable calendar range")]
    EndOutOfRange { meetup_id: MeetupId },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Projection {
    pub events: Vec<CalendarEvent>,
    pub rejected: Vec<ProjectionError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    pub default_start: NaiveTime,
    pub default_duration: Duration,
}

impl Default for Projector {
    fn default() -> Self {
        Self {
            default_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            default_duration: Duration::minutes(DEFAULT_DURATION_MINUTES),
        }
    }
}

impl Projector {
    pub fn new(default_start: &str, default_duration_minutes: i64) -> ClubResult<Self> {
        let default_start = NaiveTime::parse_from_str(default_start, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(default_start, "%H:%M"))
            .map_err(|e| {
                ClubError::Config(format!("Invalid default start time '{}': {}", default_start, e))
            })?;
        if !(1..=MAX_DURATION_MINUTES).contains(&default_duration_minutes) {
            return Err(ClubError::Config(format!(
                "Default duration must be between 1 and {} minutes, got {}",
                MAX_DURATION_MINUTES, default_duration_minutes
            )));
        }
        let default_duration = Duration::try_minutes(default_duration_minutes).ok_or_else(|| {
            ClubError::Config(format!(
                "Default duration of {} minutes is out of range",
                default_duration_minutes
            ))
        })?;
        Ok(Self {
            default_start,
            default_duration,
        })
    }

    /// Project every meetup, in input order. Undated meetups are reported in
    /// `rejected` instead of aborting the pass.
    pub fn project(&self, meetups: &[Meetup], roster: &Roster) -> Projection {
        let mut projection = Projection::default();
        for meetup in meetups {
            match self.project_one(meetup, roster) {
                Ok(event) => projection.events.push(event),
                Err(e) => {
                    warn!("Skipping meetup on calendar: {}", e);
                    projection.rejected.push(e);
                }
            }
        }
        debug!(
            "Projected {} meetups ({} rejected) against a roster of {}",
            projection.events.len(),
            projection.rejected.len(),
            roster.len()
        );
        projection
    }

    pub fn project_one(
        &self,
        meetup: &Meetup,
        roster: &Roster,
    ) -> Result<CalendarEvent, ProjectionError> {
        let date = meetup
            .date
            .ok_or(ProjectionError::MissingDate { meetup_id: meetup.id })?;

        let start = date.and_time(meetup.start_time.unwrap_or(self.default_start));
        let end = match meetup.end_time {
            Some(end_time) => date.and_time(end_time),
            None => start
                .checked_add_signed(self.default_duration)
                .ok_or(ProjectionError::EndOutOfRange { meetup_id: meetup.id })?,
        };

        Ok(CalendarEvent {
            id: meetup.id,
            start,
            end,
            title: display_title(meetup),
            attendees: normalize_attendees(&meetup.attendees, roster),
            resource: meetup.clone(),
        })
    }
}

/// Project with the stock 09:00 start and one hour duration.
pub fn project(meetups: &[Meetup], roster: &Roster) -> Projection {
    Projector::default().project(meetups, roster)
}

/// The meetup's own title, or `place (course)` when it has none.
pub fn display_title(meetup: &Meetup) -> String {
    let title = meetup.title.trim();
    if !title.is_empty() {
        return title.to_string();
    }
    let place = meetup.place.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let course = meetup.course.as_deref().map(str::trim).filter(|c| !c.is_empty());
    match (place, course) {
        (Some(place), Some(course)) => format!("{} ({})", place, course),
        (Some(place), None) => place.to_string(),
        (None, Some(course)) => course.to_string(),
        (None, None) => String::new(),
    }
}

/// Collapse either join shape into `Attendee`s. Duplicate member ids keep
/// their first occurrence.
pub fn normalize_attendees(refs: &[AttendeeRef], roster: &Roster) -> Vec<Attendee> {
    let mut seen = HashSet::with_capacity(refs.len());
    let mut attendees = Vec::with_capacity(refs.len());

    for attendee in refs {
        let member_id = attendee.member_id();
        if !seen.insert(member_id) {
            warn!("Duplicate attendee link for member {} ignored", member_id);
            continue;
        }
        attendees.push(match attendee {
            AttendeeRef::Id(id) => Attendee {
                id: None,
                member_id: *id,
                nickname: roster.nickname_for(*id),
                donation_paid: false,
                donation_amount: 0,
            },
            AttendeeRef::LinkRow(row) => Attendee {
                id: row.id,
                member_id: row.member_id,
                nickname: row
                    .embedded_nickname()
                    .map(str::to_string)
                    .unwrap_or_else(|| roster.nickname_for(row.member_id)),
                donation_paid: row.donation_paid,
                donation_amount: row.donation_amount,
            },
        });
    }

    attendees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkRow, MemberId};
    use crate::roster::tests::member;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn meetup(value: serde_json::Value) -> Meetup {
        serde_json::from_value(value).unwrap()
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S")
            .unwrap()
    }

    #[test]
    fn test_untitled_meetup_without_times() {
        let m = meetup(json!({
            "id": 1,
            "date": "2025-03-01",
            "start_time": null,
            "title": "",
            "place": "North Trail",
            "course": "Ridge Loop"
        }));

        let projection = project(&[m], &Roster::empty());
        let event = &projection.events[0];
        assert_eq!(event.title, "North Trail (Ridge Loop)");
        assert_eq!(event.start, at("2025-03-01", "09:00:00"));
        assert_eq!(event.end, at("2025-03-01", "10:00:00"));
    }

    #[test]
    fn test_explicit_times_and_title() {
        let m = meetup(json!({
            "id": 2,
            "date": "2025-04-12",
            "start_time": "06:30:00",
            "end_time": "13:15:00",
            "title": "Summit push",
            "place": "Base camp"
        }));

        let event = Projector::default().project_one(&m, &Roster::empty()).unwrap();
        assert_eq!(event.title, "Summit push");
        assert_eq!(event.start, at("2025-04-12", "06:30:00"));
        assert_eq!(event.end, at("2025-04-12", "13:15:00"));
    }

    #[test]
    fn test_place_without_course() {
        let m = meetup(json!({ "id": 3, "date": "2025-04-12", "place": "Lakeside" }));
        assert_eq!(display_title(&m), "Lakeside");
    }

    #[test]
    fn test_course_without_place() {
        let m = meetup(json!({ "id": 4, "date": "2025-04-12", "course": " Ridge " }));
        assert_eq!(display_title(&m), "Ridge");
    }

    #[test]
    fn test_missing_date_is_reported_not_fatal() {
        let meetups = vec![
            meetup(json!({ "id": 1, "date": "2025-03-01", "title": "A" })),
            meetup(json!({ "id": 2, "title": "B" })),
            meetup(json!({ "id": 3, "date": "2025-03-02", "title": "C" })),
        ];

        let projection = project(&meetups, &Roster::empty());
        let ids: Vec<_> = projection.events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![MeetupId(1), MeetupId(3)]);
        assert_eq!(
            projection.rejected,
            vec![ProjectionError::MissingDate { meetup_id: MeetupId(2) }]
        );
    }

    #[test]
    fn test_configured_defaults() {
        let projector = Projector::new("08:00", 90).unwrap();
        let m = meetup(json!({ "id": 1, "date": "2025-03-01", "title": "Walk" }));
        let event = projector.project_one(&m, &Roster::empty()).unwrap();
        assert_eq!(event.start, at("2025-03-01", "08:00:00"));
        assert_eq!(event.end, at("2025-03-01", "09:30:00"));
    }

    #[test]
    fn test_rejects_bad_defaults() {
        assert!(Projector::new("nine", 60).is_err());
        assert!(Projector::new("09:00:00", 0).is_err());
        assert!(Projector::new("09:00", MAX_DURATION_MINUTES + 1).is_err());
        assert!(Projector::new("09:00", i64::MAX).is_err());
        assert!(Projector::new("09:00", MAX_DURATION_MINUTES).is_ok());
    }

    #[test]
    fn test_end_overflow_is_rejected_per_row() {
        let projector = Projector {
            default_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            default_duration: Duration::days(365 * 300_000),
        };
        let meetups = vec![
            meetup(json!({ "id": 1, "date": "2025-03-01", "title": "A" })),
            meetup(json!({ "id": 2, "date": "2025-03-01", "start_time": "09:00", "end_time": "10:00", "title": "B" })),
        ];

        let projection = projector.project(&meetups, &Roster::empty());
        assert_eq!(projection.events.len(), 1);
        assert_eq!(projection.events[0].id, MeetupId(2));
        assert_eq!(
            projection.rejected,
            vec![ProjectionError::EndOutOfRange { meetup_id: MeetupId(1) }]
        );
    }

    #[test]
    fn test_normalize_attendees_resolves_nicknames() {
        let roster = Roster::from_members(vec![member(1, "Hawk")]);
        let refs = vec![
            AttendeeRef::Id(MemberId(1)),
            AttendeeRef::Id(MemberId(99)),
            AttendeeRef::LinkRow(LinkRow {
                id: None,
                member_id: MemberId(5),
                donation_paid: true,
                donation_amount: 3000,
                nickname: Some("Owl".to_string()),
                members: None,
            }),
            AttendeeRef::Id(MemberId(1)),
        ];

        let attendees = normalize_attendees(&refs, &roster);
        let names: Vec<_> = attendees.iter().map(|a| a.nickname.as_str()).collect();
        assert_eq!(names, vec!["Hawk", "#99", "Owl"]);
        assert!(attendees[2].donation_paid);
        assert_eq!(attendees[2].donation_amount, 3000);
    }

    #[test]
    fn test_projection_keeps_resource() {
        let m = meetup(json!({ "id": 4, "date": "2025-05-05", "title": "Run", "total_amount": 12000 }));
        let event = Projector::default().project_one(&m, &Roster::empty()).unwrap();
        assert_eq!(event.resource, m);
        assert_eq!(event.start.date(), NaiveDate::from_ymd_opt(2025, 5, 5).unwrap());
    }
}
