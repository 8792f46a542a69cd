//! Form validation. Everything here runs before a request is sent; a
//! failure names the offending field.

use crate::error::{ClubError, ClubResult};
use crate::models::{
    ActivityType, AttendeePayment, MeetupDraft, MeetupForm, MeetupStatus, MemberDraft, MemberId,
};
use chrono::{Datelike, NaiveDate, NaiveTime};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]+\.[A-Za-z]{2,63}$").unwrap());

/// A meetup form that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMeetup {
    pub draft: MeetupDraft,
    /// `None` when the form left the attendee list untouched
    pub attendees: Option<HashSet<MemberId>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate date string has format YYYY-MM-DD within 2000..=2100
pub fn validate_date(raw: Option<&str>) -> ClubResult<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(ClubError::validation("date", "Date is required"));
    };
    if !DATE_RE.is_match(raw) {
        return Err(ClubError::validation(
            "date",
            format!("'{}' is not a YYYY-MM-DD date", raw),
        ));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| ClubError::validation("date", format!("'{}': {}", raw, e)))?;
    if !(2000..=2100).contains(&date.year()) {
        return Err(ClubError::validation(
            "date",
            format!("Year {} is out of range", date.year()),
        ));
    }
    Ok(date)
}

/// Validate an optional HH:mm[:ss] time. Blank means "not set".
pub fn validate_time(field: &'static str, raw: Option<&str>) -> ClubResult<Option<NaiveTime>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if !TIME_RE.is_match(raw) {
        return Err(ClubError::validation(
            field,
            format!("'{}' is not an HH:mm:ss time", raw),
        ));
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(Some)
        .map_err(|e| ClubError::validation(field, format!("'{}': {}", raw, e)))
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_meetup(form: MeetupForm) -> ClubResult<ValidatedMeetup> {
    let date = validate_date(form.date.as_deref())?;
    let start_time = validate_time("start_time", form.start_time.as_deref())?;
    let end_time = validate_time("end_time", form.end_time.as_deref())?;
    if let (Some(start), Some(end)) = (start_time, end_time) {
        if end <= start {
            return Err(ClubError::validation(
                "end_time",
                "End time must be after the start time",
            ));
        }
    }

    let title = non_blank(form.title).unwrap_or_default();
    let place = non_blank(form.place);
    if title.is_empty() && place.is_none() {
        return Err(ClubError::validation("title", "Either a title or a place is required"));
    }

    let activity_type = non_blank(form.activity_type)
        .map(ActivityType)
        .ok_or_else(|| ClubError::validation("type", "Meetup type is required"))?;

    let total_amount = form.total_amount.unwrap_or(0);
    if total_amount < 0 {
        return Err(ClubError::validation("total_amount", "Total cannot be negative"));
    }

    let status = form.status.unwrap_or_default();
    let cancel_reason = non_blank(form.cancel_reason);
    if status == MeetupStatus::Cancelled && cancel_reason.is_none() {
        warn!("Meetup on {} is cancelled without a reason", date);
    }

    let mut seen = HashSet::new();
    let sub_leader_member_ids = form
        .sub_leader_member_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();

    let attendees = form
        .attendees
        .map(|refs| refs.iter().map(|r| r.member_id()).collect());

    Ok(ValidatedMeetup {
        draft: MeetupDraft {
            date,
            start_time,
            end_time,
            title,
            place,
            course: non_blank(form.course),
            leader_member_id: form.leader_member_id,
            leader_nickname: non_blank(form.leader_nickname),
            sub_leader_member_ids,
            description: non_blank(form.description),
            activity_type,
            level: non_blank(form.level),
            status,
            cancel_reason,
            review: non_blank(form.review),
            total_amount,
        },
        attendees,
    })
}

pub fn validate_member(draft: MemberDraft) -> ClubResult<MemberDraft> {
    let nickname = draft.nickname.trim().to_string();
    if nickname.is_empty() {
        return Err(ClubError::validation("nickname", "Nickname is required"));
    }
    let email = non_blank(draft.email);
    if let Some(email) = &email {
        if !validate_email(email) {
            return Err(ClubError::validation(
                "email",
                format!("Invalid email format: {}", email),
            ));
        }
    }
    Ok(MemberDraft {
        nickname,
        name: non_blank(draft.name),
        email,
        phone: non_blank(draft.phone),
        region: non_blank(draft.region),
        child_name: non_blank(draft.child_name),
        handle: non_blank(draft.handle),
        status: draft.status,
    })
}

pub fn validate_payment(payment: AttendeePayment) -> ClubResult<AttendeePayment> {
    if payment.donation_amount < 0 {
        return Err(ClubError::validation(
            "donation_amount",
            "Amount cannot be negative",
        ));
    }
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendeeRef;
    use test_case::test_case;

    fn form() -> MeetupForm {
        MeetupForm {
            date: Some("2025-03-01".to_string()),
            title: Some("Ridge hike".to_string()),
            activity_type: Some("hiking".to_string()),
            ..Default::default()
        }
    }

    fn field_of(result: ClubResult<ValidatedMeetup>) -> &'static str {
        match result {
            Err(ClubError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test_case(None, "date" ; "missing date")]
    #[test_case(Some("2025/03/01"), "date" ; "slashes")]
    #[test_case(Some("1999-12-31"), "date" ; "year out of range")]
    #[test_case(Some("2025-02-30"), "date" ; "impossible day")]
    fn test_bad_dates(date: Option<&str>, field: &str) {
        let f = MeetupForm {
            date: date.map(str::to_string),
            ..form()
        };
        assert_eq!(field_of(validate_meetup(f)), field);
    }

    #[test]
    fn test_minimal_form() {
        let validated = validate_meetup(form()).unwrap();
        assert_eq!(validated.draft.date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(validated.draft.start_time, None);
        assert_eq!(validated.draft.status, MeetupStatus::Pending);
        assert_eq!(validated.attendees, None);
    }

    #[test]
    fn test_times() {
        let f = MeetupForm {
            start_time: Some("07:30".to_string()),
            end_time: Some("12:00:00".to_string()),
            ..form()
        };
        let draft = validate_meetup(f).unwrap().draft;
        assert_eq!(draft.start_time, NaiveTime::from_hms_opt(7, 30, 0));
        assert_eq!(draft.end_time, NaiveTime::from_hms_opt(12, 0, 0));

        let f = MeetupForm {
            start_time: Some("12:00:00".to_string()),
            end_time: Some("11:00:00".to_string()),
            ..form()
        };
        assert_eq!(field_of(validate_meetup(f)), "end_time");

        let f = MeetupForm {
            start_time: Some("25:00".to_string()),
            ..form()
        };
        assert_eq!(field_of(validate_meetup(f)), "start_time");
    }

    #[test]
    fn test_title_or_place_required() {
        let f = MeetupForm {
            title: Some("  ".to_string()),
            ..form()
        };
        assert_eq!(field_of(validate_meetup(f)), "title");

        let f = MeetupForm {
            title: None,
            place: Some("North Trail".to_string()),
            ..form()
        };
        assert!(validate_meetup(f).is_ok());
    }

    #[test]
    fn test_type_required() {
        let f = MeetupForm {
            activity_type: None,
            ..form()
        };
        assert_eq!(field_of(validate_meetup(f)), "type");
    }

    #[test]
    fn test_attendees_and_sub_leaders_deduplicated() {
        let f = MeetupForm {
            sub_leader_member_ids: vec![MemberId(2), MemberId(3), MemberId(2)],
            attendees: Some(vec![
                AttendeeRef::Id(MemberId(5)),
                AttendeeRef::Id(MemberId(5)),
                AttendeeRef::Id(MemberId(6)),
            ]),
            ..form()
        };
        let validated = validate_meetup(f).unwrap();
        assert_eq!(validated.draft.sub_leader_member_ids, vec![MemberId(2), MemberId(3)]);
        assert_eq!(
            validated.attendees,
            Some([MemberId(5), MemberId(6)].into_iter().collect())
        );
    }

    #[test]
    fn test_member_validation() {
        let ok = validate_member(MemberDraft {
            nickname: "  Hawk ".to_string(),
            email: Some("hawk@example.com".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ok.nickname, "Hawk");

        assert!(validate_member(MemberDraft::default()).is_err());
        assert!(validate_member(MemberDraft {
            nickname: "Owl".to_string(),
            email: Some("not-an-email".to_string()),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_negative_payment_rejected() {
        assert!(validate_payment(AttendeePayment {
            donation_paid: true,
            donation_amount: -1
        })
        .is_err());
    }
}
