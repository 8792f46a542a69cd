//! JSON-over-HTTP storage client.

use super::{sort_by_date, MeetupStore};
use crate::error::{ClubError, ClubResult};
use crate::models::{
    AttendeeLink, AttendeeLinkId, AttendeePayment, Meetup, MeetupDraft, MeetupId, Member,
    MemberDraft, MemberId, NewAttendeeLink,
};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const MEETUPS: &str = "api/meetups";
const ATTENDEES: &str = "api/meetup-attendees";
const MEMBERS: &str = "api/members";

/// Some backends wrap payloads as `{ "data": ... }`, others return them bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

/// Decode a listing row by row. Rows that do not decode are logged and
/// skipped so one bad record cannot empty the whole listing.
fn decode_rows<T: DeserializeOwned>(operation: &str, rows: Vec<Value>) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            serde_json::from_value(row)
                .map_err(|e| warn!("{}: skipping row {} (id {}): {}", operation, index, id, e))
                .ok()
        })
        .collect();
    if decoded.len() < total {
        warn!("{}: {} of {} rows skipped", operation, total - decoded.len(), total);
    }
    decoded
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct RestStore {
    client: Client,
    base_url: Url,
}

impl RestStore {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> ClubResult<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClubError::Config(format!("Invalid server URL '{}': {}", base_url, e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClubError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> ClubResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClubError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    fn builder(&self, method: Method, path: &str) -> ClubResult<RequestBuilder> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url))
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> ClubResult<Response> {
        let response = request.send().await.map_err(|e| {
            error!("API request failed: {} ({})", operation, e);
            ClubError::remote(operation, e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body
                .message
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16())),
            Err(_) => status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16())),
        };
        error!("API request failed: {} ({})", operation, message);
        Err(ClubError::remote(operation, message))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ClubResult<T> {
        let response = self.send(operation, request).await?;
        response
            .json::<Envelope<T>>()
            .await
            .map(Envelope::into_inner)
            .map_err(|e| ClubError::remote(operation, format!("unexpected response: {}", e)))
    }

    async fn write<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClubResult<T> {
        let request = self.builder(method, path)?.json(body);
        self.fetch(operation, request).await
    }

    async fn remove(&self, operation: &str, path: &str) -> ClubResult<()> {
        let request = self.builder(Method::DELETE, path)?;
        // Delete responses vary between backends; only the status matters
        self.send(operation, request).await.map(|_| ())
    }
}

#[async_trait]
impl MeetupStore for RestStore {
    async fn list_meetups(&self) -> ClubResult<Vec<Meetup>> {
        let request = self.builder(Method::GET, MEETUPS)?;
        let rows: Vec<Value> = self.fetch("List meetups", request).await?;
        let mut meetups: Vec<Meetup> = decode_rows("List meetups", rows);
        sort_by_date(&mut meetups);
        Ok(meetups)
    }

    async fn create_meetup(&self, draft: &MeetupDraft) -> ClubResult<Meetup> {
        self.write("Create meetup", Method::POST, MEETUPS, draft).await
    }

    async fn update_meetup(&self, id: MeetupId, draft: &MeetupDraft) -> ClubResult<Meetup> {
        let path = format!("{}/{}", MEETUPS, id);
        self.write("Update meetup", Method::PUT, &path, draft).await
    }

    async fn delete_meetup(&self, id: MeetupId) -> ClubResult<()> {
        self.remove("Delete meetup", &format!("{}/{}", MEETUPS, id)).await
    }

    async fn list_attendees(&self, meetup_id: Option<MeetupId>) -> ClubResult<Vec<AttendeeLink>> {
        let mut request = self.builder(Method::GET, ATTENDEES)?;
        if let Some(id) = meetup_id {
            request = request.query(&[("meetup_id", id.to_string())]);
        }
        let rows: Vec<Value> = self.fetch("List attendees", request).await?;
        let links: Vec<AttendeeLink> = decode_rows("List attendees", rows);
        // Not every backend honours the filter
        Ok(links
            .into_iter()
            .filter(|l| meetup_id.map_or(true, |id| l.meetup_id == id))
            .collect())
    }

    async fn create_attendee(&self, link: &NewAttendeeLink) -> ClubResult<AttendeeLink> {
        self.write("Add attendee", Method::POST, ATTENDEES, link).await
    }

    async fn update_attendee(
        &self,
        id: AttendeeLinkId,
        payment: &AttendeePayment,
    ) -> ClubResult<AttendeeLink> {
        let path = format!("{}/{}", ATTENDEES, id);
        self.write("Update attendee", Method::PUT, &path, payment).await
    }

    async fn delete_attendee(&self, id: AttendeeLinkId) -> ClubResult<()> {
        self.remove("Remove attendee", &format!("{}/{}", ATTENDEES, id)).await
    }

    async fn list_members(&self) -> ClubResult<Vec<Member>> {
        let request = self.builder(Method::GET, MEMBERS)?;
        let rows: Vec<Value> = self.fetch("List members", request).await?;
        Ok(decode_rows("List members", rows))
    }

    async fn create_member(&self, draft: &MemberDraft) -> ClubResult<Member> {
        self.write("Create member", Method::POST, MEMBERS, draft).await
    }

    async fn update_member(&self, id: MemberId, draft: &MemberDraft) -> ClubResult<Member> {
        let path = format!("{}/{}", MEMBERS, id);
        self.write("Update member", Method::PUT, &path, draft).await
    }

    async fn delete_member(&self, id: MemberId) -> ClubResult<()> {
        self.remove("Delete member", &format!("{}/{}", MEMBERS, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_urls_keep_base_path() {
        let store = RestStore::new("http://localhost:4000/club", None).unwrap();
        assert_eq!(
            store.url(MEETUPS).unwrap().as_str(),
            "http://localhost:4000/club/api/meetups"
        );
        assert_eq!(
            store.url(&format!("{}/{}", MEMBERS, MemberId(5))).unwrap().as_str(),
            "http://localhost:4000/club/api/members/5"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            RestStore::new("not a url", None),
            Err(ClubError::Config(_))
        ));
    }

    #[test]
    fn test_envelope_shapes() {
        let wrapped: Envelope<Member> = serde_json::from_value(json!({
            "data": { "id": 1, "nickname": "Hawk" }
        }))
        .unwrap();
        assert_eq!(wrapped.into_inner().nickname, "Hawk");

        let bare: Envelope<Vec<Member>> =
            serde_json::from_value(json!([{ "id": 2, "nickname": "Owl" }])).unwrap();
        assert_eq!(bare.into_inner()[0].id, MemberId(2));
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let rows: Envelope<Vec<Value>> = serde_json::from_value(json!({ "data": [
            { "id": 1, "date": "2025-03-01", "title": "Ridge", "status": "pending" },
            { "id": 2, "date": "2025-03-02", "title": "Lake", "status": "postponed" },
            { "id": "not-a-number", "date": "2025-03-03", "title": "Broken" },
            { "id": 4, "date": "2025-03-04", "title": "River", "meetup_attendees": "oops" },
            { "id": 5, "date": "2025-03-05", "title": "Summit", "status": "취소" }
        ]}))
        .unwrap();

        let meetups: Vec<Meetup> = decode_rows("List meetups", rows.into_inner());
        let ids: Vec<MeetupId> = meetups.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![MeetupId(1), MeetupId(2), MeetupId(5)]);
        assert!(meetups[2].is_cancelled());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_remote_error() {
        let store = RestStore::new("http://127.0.0.1:9", Some(Duration::from_millis(500))).unwrap();
        let err = store.list_members().await.unwrap_err();
        assert!(matches!(err, ClubError::Remote { .. }), "got {:?}", err);
    }
}
