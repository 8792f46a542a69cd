use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::calendar::{style_for, CalendarEvent, EventStyle, ProjectionError, TypeOption};
use crate::config::Config;
use crate::error::ClubError;
use crate::models::{
    AttendeeLinkId, AttendeePayment, AttendeeRef, MeetupForm, MeetupId, MemberDraft, MemberId,
};
use crate::search::MeetupQuery;
use crate::services::{ClubService, MeetupSaved};

// API state that will be shared across handlers
pub struct ApiState {
    pub service: ClubService,
    pub config: Config,
}

// General API response; the front-end shows `message` as its notice
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

type ApiError = (StatusCode, Json<ApiResponse<Value>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn status_for(err: &ClubError) -> StatusCode {
    match err {
        ClubError::Validation { .. } => StatusCode::BAD_REQUEST,
        ClubError::Remote { .. } => StatusCode::BAD_GATEWAY,
        ClubError::PartialBatch { .. } => StatusCode::MULTI_STATUS,
        ClubError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(action: &str, err: ClubError) -> ApiError {
    let status = status_for(&err);
    let message = format!("Failed to {}: {}", action, err);
    let data = match &err {
        ClubError::PartialBatch { failures, .. } => Some(json!({ "failures": failures })),
        ClubError::Validation { field, .. } => Some(json!({ "field": field })),
        _ => None,
    };
    (
        status,
        Json(ApiResponse {
            success: false,
            message,
            data,
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct StyledEvent {
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub style: EventStyle,
}

#[derive(Debug, Serialize)]
pub struct CalendarData {
    pub events: Vec<StyledEvent>,
    pub rejected: Vec<ProjectionError>,
}

#[derive(Debug, Deserialize)]
pub struct AttendeesRequest {
    #[serde(alias = "attendees")]
    pub member_ids: Vec<AttendeeRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberSearch {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeetupTypes {
    pub types: Vec<TypeOption>,
    pub levels: Vec<String>,
}

fn styled(state: &ApiState, events: Vec<CalendarEvent>) -> Vec<StyledEvent> {
    events
        .into_iter()
        .map(|event| {
            let style = style_for(&event, &state.config.palette);
            StyledEvent { event, style }
        })
        .collect()
}

fn saved_message(action: &str, saved: &MeetupSaved) -> String {
    match &saved.attendee_warning {
        Some(warning) => format!("Meetup {}, but {}", action, warning),
        None => format!("Meetup {}", action),
    }
}

// Health check endpoint
async fn health_check() -> &'static str {
    "Trailclub API is running"
}

async fn calendar_handler(State(state): State<Arc<ApiState>>) -> ApiResult<CalendarData> {
    let projection = state
        .service
        .calendar()
        .await
        .map_err(|e| failure("load calendar", e))?;
    let data = CalendarData {
        events: styled(&state, projection.events),
        rejected: projection.rejected,
    };
    Ok(ApiResponse::ok("Calendar loaded", data))
}

async fn list_meetups_handler(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<MeetupQuery>,
) -> ApiResult<Vec<StyledEvent>> {
    let filter = query.into_filter().map_err(|e| failure("filter meetups", e))?;
    let events = state
        .service
        .meetup_events(&filter)
        .await
        .map_err(|e| failure("load meetups", e))?;
    let count = events.len();
    Ok(ApiResponse::ok(
        format!("{} meetups", count),
        styled(&state, events),
    ))
}

async fn create_meetup_handler(
    State(state): State<Arc<ApiState>>,
    Json(form): Json<MeetupForm>,
) -> ApiResult<MeetupSaved> {
    let saved = state
        .service
        .create_meetup(form)
        .await
        .map_err(|e| failure("save meetup", e))?;
    Ok(ApiResponse::ok(saved_message("created", &saved), saved))
}

async fn update_meetup_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(form): Json<MeetupForm>,
) -> ApiResult<MeetupSaved> {
    let saved = state
        .service
        .update_meetup(MeetupId(id), form)
        .await
        .map_err(|e| failure("save meetup", e))?;
    Ok(ApiResponse::ok(saved_message("updated", &saved), saved))
}

async fn delete_meetup_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<MeetupId> {
    let id = MeetupId(id);
    state
        .service
        .delete_meetup(id)
        .await
        .map_err(|e| failure("delete meetup", e))?;
    Ok(ApiResponse::ok("Meetup deleted", id))
}

async fn list_attendees_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let attendees = state
        .service
        .attendees(MeetupId(id))
        .await
        .map_err(|e| failure("load attendees", e))?;
    Ok(ApiResponse::ok(
        format!("{} attendees", attendees.len()),
        json!(attendees),
    ))
}

async fn set_attendees_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(request): Json<AttendeesRequest>,
) -> ApiResult<Value> {
    let desired: HashSet<MemberId> = request.member_ids.iter().map(|r| r.member_id()).collect();
    let report = state
        .service
        .set_attendees(MeetupId(id), &desired)
        .await
        .map_err(|e| failure("update attendees", e))?;
    Ok(ApiResponse::ok(
        format!(
            "Attendees updated ({} added, {} removed)",
            report.added.len(),
            report.removed.len()
        ),
        json!(report),
    ))
}

async fn update_attendee_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(payment): Json<AttendeePayment>,
) -> ApiResult<Value> {
    let link = state
        .service
        .update_attendee_payment(AttendeeLinkId(id), payment)
        .await
        .map_err(|e| failure("update attendee", e))?;
    Ok(ApiResponse::ok("Attendee updated", json!(link)))
}

async fn list_members_handler(
    State(state): State<Arc<ApiState>>,
    Query(search): Query<MemberSearch>,
) -> ApiResult<Value> {
    let result = match search.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => state.service.search_members(q).await,
        None => state.service.list_members().await,
    };
    let members = result.map_err(|e| failure("load members", e))?;
    Ok(ApiResponse::ok(
        format!("{} members", members.len()),
        json!(members),
    ))
}

async fn suggest_members_handler(
    State(state): State<Arc<ApiState>>,
    Query(search): Query<MemberSearch>,
) -> ApiResult<Value> {
    let options = state
        .service
        .suggest_members(search.q.as_deref().unwrap_or_default())
        .await;
    Ok(ApiResponse::ok(
        format!("{} suggestions", options.len()),
        json!(options),
    ))
}

async fn create_member_handler(
    State(state): State<Arc<ApiState>>,
    Json(draft): Json<MemberDraft>,
) -> ApiResult<Value> {
    let member = state
        .service
        .create_member(draft)
        .await
        .map_err(|e| failure("save member", e))?;
    Ok(ApiResponse::ok("Member created", json!(member)))
}

async fn update_member_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(draft): Json<MemberDraft>,
) -> ApiResult<Value> {
    let member = state
        .service
        .update_member(MemberId(id), draft)
        .await
        .map_err(|e| failure("save member", e))?;
    Ok(ApiResponse::ok("Member updated", json!(member)))
}

async fn delete_member_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<MemberId> {
    let id = MemberId(id);
    state
        .service
        .delete_member(id)
        .await
        .map_err(|e| failure("delete member", e))?;
    Ok(ApiResponse::ok("Member deleted", id))
}

async fn meetup_types_handler(State(state): State<Arc<ApiState>>) -> ApiResult<MeetupTypes> {
    Ok(ApiResponse::ok(
        "Meetup types",
        MeetupTypes {
            types: state.config.meetup_types.clone(),
            levels: state.config.levels.clone(),
        },
    ))
}

pub fn router(state: Arc<ApiState>) -> Router {
    // The front-end is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/calendar", get(calendar_handler))
        .route(
            "/meetups",
            get(list_meetups_handler).post(create_meetup_handler),
        )
        .route(
            "/meetups/{id}",
            put(update_meetup_handler).delete(delete_meetup_handler),
        )
        .route(
            "/meetups/{id}/attendees",
            get(list_attendees_handler).put(set_attendees_handler),
        )
        .route("/attendees/{id}", patch(update_attendee_handler))
        .route(
            "/members",
            get(list_members_handler).post(create_member_handler),
        )
        .route("/members/suggest", get(suggest_members_handler))
        .route(
            "/members/{id}",
            put(update_member_handler).delete(delete_member_handler),
        )
        .route("/meetup-types", get(meetup_types_handler))
        .layer(cors)
        .with_state(state)
}

// Create and start the API server
pub async fn start_api_server(state: Arc<ApiState>, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| anyhow!("Invalid bind address '{}': {}", bind, e))?;
    if !addr.ip().is_loopback() {
        warn!("API server is listening on a non-loopback address without authentication");
    }

    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to address: {}", e))?;

    info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Failed to start API server: {}", e))?;

    Ok(())
}
