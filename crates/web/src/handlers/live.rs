//! Command endpoints and the SSE join endpoint for the live platform.
//!
//! Judges authenticate with a signed token scanned from their login QR;
//! director commands ride behind the admin bearer key; viewers are
//! receive-only. Every command is acknowledged to its originator only,
//! broadcasts go through the broker on success.

use actix_web::{web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use engine::machine::StateMachine;
use engine::{JudgeRole, Vote};
use storage::models::{AttemptStatus, CurrentState, Meet};
use storage::Database;

use crate::broker::stream::SessionStream;
use crate::broker::{sse_frame, Broker, SessionRole};
use crate::config::Config;
use crate::error::{WebError, WebResult};
use crate::handlers::meet_by_code;
use crate::middleware::auth::{ApiKeys, JudgeClaims, JudgeTokens};

#[derive(Debug, Deserialize, IntoParams)]
pub struct JoinQuery {
    /// judge | director | viewer
    pub role: String,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub attempt_id: i64,
    /// WHITE or RED
    pub vote: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteAck {
    pub ok: bool,
    pub complete: bool,
    pub votes_cast: usize,
    pub outcome: Option<AttemptStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitializeRequest {
    pub flight_id: i64,
    pub lift_id: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeclareRequest {
    pub registration_id: i64,
    pub lift_id: i64,
    #[validate(range(min = 1, max = 4, message = "attempt_no must be between 1 and 4"))]
    pub attempt_no: i16,
    #[validate(range(min = 0.0, message = "weight must be non-negative"))]
    pub weight_kg: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimerRequest {
    /// start | stop
    pub action: String,
    pub duration_s: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JudgeTokenRequest {
    pub judge_id: i64,
    /// HEAD, LEFT or RIGHT
    pub role: String,
    #[validate(range(min = 1, message = "ttl_minutes must be positive"))]
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JudgeTokenResponse {
    pub token: String,
    pub login_url: String,
}

fn verify_judge(
    tokens: &JudgeTokens,
    token: &str,
    meet: &Meet,
) -> Result<(JudgeClaims, JudgeRole), WebError> {
    let claims = tokens
        .verify(token)
        .map_err(|e| WebError::Unauthorized(format!("invalid judge token: {e}")))?;
    if claims.meet_id != meet.meet_id {
        return Err(WebError::Unauthorized(
            "judge token was issued for a different meet".into(),
        ));
    }
    let role = claims
        .judge_role()
        .map_err(WebError::BadRequest)?;
    Ok((claims, role))
}

/// Open an SSE session on the meet's event stream.
pub async fn join_events(
    db: web::Data<Database>,
    broker: web::Data<Broker>,
    machine: web::Data<StateMachine>,
    tokens: web::Data<JudgeTokens>,
    api_keys: web::Data<ApiKeys>,
    path: web::Path<String>,
    query: web::Query<JoinQuery>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;

    let role = match query.role.to_ascii_lowercase().as_str() {
        "viewer" => SessionRole::Viewer,
        "director" => {
            let token = query
                .token
                .as_deref()
                .ok_or_else(|| WebError::Unauthorized("director sessions require a token".into()))?;
            if !api_keys.is_valid(token) {
                return Err(WebError::Unauthorized("invalid director token".into()));
            }
            SessionRole::Director
        }
        "judge" => {
            let token = query
                .token
                .as_deref()
                .ok_or_else(|| WebError::Unauthorized("judge sessions require a token".into()))?;
            let (claims, role) = verify_judge(&tokens, token, &meet)?;
            SessionRole::Judge { judge_id: claims.judge_id, role }
        }
        other => return Err(WebError::BadRequest(format!("unknown session role: {other}"))),
    };

    let session = broker.subscribe(meet.meet_id, role);

    // Prime the session so late joiners see the platform immediately.
    let current = machine.current().await?;
    if let Some(frame) = sse_frame(&engine::PushEvent::StateUpdate { current: current.clone() }) {
        let _ = session.tx.try_send(frame);
    }
    if role == SessionRole::Director {
        if let (Some(lift_id), Some(round)) = (current.lift_id, current.round) {
            let queue = machine.current_queue().await?;
            if let Some(frame) =
                sse_frame(&engine::PushEvent::QueueUpdate { lift_id, round, queue })
            {
                let _ = session.tx.try_send(frame);
            }
        }
    }

    let broker: Arc<Broker> = broker.into_inner();
    let stream = SessionStream::new(broker, meet.meet_id, session.session_id, session.rx);

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

/// Submit one judge's vote for an attempt.
#[utoipa::path(
    post,
    path = "/api/live/{meet_code}/vote",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote registered", body = VoteAck),
        (status = 401, description = "Missing or invalid judge token"),
        (status = 409, description = "Attempt already judged")
    ),
    tag = "live"
)]
pub async fn cast_vote(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    tokens: web::Data<JudgeTokens>,
    auth: BearerAuth,
    path: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let (_, role) = verify_judge(&tokens, auth.token(), &meet)?;

    let vote: Vote = body.vote.parse().map_err(WebError::BadRequest)?;
    let result = machine
        .cast_vote(meet.meet_id, body.attempt_id, role, vote)
        .await?;

    Ok(HttpResponse::Ok().json(VoteAck {
        ok: true,
        complete: result.complete,
        votes_cast: result.snapshot.len(),
        outcome: result.outcome,
    }))
}

/// Put the flight's first group on the platform.
#[utoipa::path(
    post,
    path = "/api/live/{meet_code}/initialize",
    request_body = InitializeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Meet initialized", body = CurrentState),
        (status = 409, description = "Flight is not ready")
    ),
    tag = "live"
)]
pub async fn initialize(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
    body: web::Json<InitializeRequest>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let current = machine
        .initialize(meet.meet_id, body.flight_id, body.lift_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "current": current })))
}

/// Advance the current-registration pointer.
#[utoipa::path(
    post,
    path = "/api/live/{meet_code}/next",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pointer advanced", body = CurrentState),
        (status = 409, description = "No meet is initialized")
    ),
    tag = "live"
)]
pub async fn next(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let current = machine.next(meet.meet_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "current": current })))
}

/// Record a declared weight for an attempt slot.
#[utoipa::path(
    post,
    path = "/api/live/{meet_code}/declare",
    request_body = DeclareRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Weight declared"),
        (status = 409, description = "Attempt slot is not open")
    ),
    tag = "live"
)]
pub async fn declare(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
    body: web::Json<DeclareRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let meet = meet_by_code(&db, &path).await?;
    let attempt = machine
        .declare_weight(
            meet.meet_id,
            body.registration_id,
            body.lift_id,
            body.attempt_no,
            body.weight_kg,
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "attempt": attempt })))
}

/// Start or stop the platform timer.
#[utoipa::path(
    post,
    path = "/api/live/{meet_code}/timer",
    request_body = TimerRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Timer updated", body = CurrentState)
    ),
    tag = "live"
)]
pub async fn timer(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
    body: web::Json<TimerRequest>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let current = match body.action.to_ascii_lowercase().as_str() {
        "start" => {
            let duration_s = body
                .duration_s
                .ok_or_else(|| WebError::BadRequest("timer start requires duration_s".into()))?;
            machine.timer_start(meet.meet_id, duration_s).await?
        }
        "stop" => machine.timer_stop(meet.meet_id).await?,
        other => return Err(WebError::BadRequest(format!("unknown timer action: {other}"))),
    };
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "current": current })))
}

/// Operator recovery hatch.
pub async fn reset(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let current = machine.reset(meet.meet_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "current": current })))
}

/// What is happening on the platform right now.
#[utoipa::path(
    get,
    path = "/api/live/{meet_code}/state",
    responses((status = 200, description = "Current state", body = CurrentState)),
    tag = "live"
)]
pub async fn get_state(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    meet_by_code(&db, &path).await?;
    let current = machine.current().await?;
    Ok(HttpResponse::Ok().json(current))
}

/// The next-up queue for the live (group, lift, round).
#[utoipa::path(
    get,
    path = "/api/live/{meet_code}/queue",
    responses((status = 200, description = "Current queue")),
    tag = "live"
)]
pub async fn get_queue(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    meet_by_code(&db, &path).await?;
    let queue = machine.current_queue().await?;
    Ok(HttpResponse::Ok().json(queue))
}

/// Attempts with a ballot still open and their vote counts. Ballots are
/// process-local, so after a restart this list is empty and the director
/// re-prompts the judges.
#[utoipa::path(
    get,
    path = "/api/live/{meet_code}/ballots",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Open ballots with vote counts")),
    tag = "live"
)]
pub async fn open_ballots(
    db: web::Data<Database>,
    machine: web::Data<StateMachine>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    meet_by_code(&db, &path).await?;
    let ballots: Vec<_> = machine
        .tally()
        .open_ballots()
        .into_iter()
        .map(|(attempt_id, votes_cast)| json!({ "attempt_id": attempt_id, "votes_cast": votes_cast }))
        .collect();
    Ok(HttpResponse::Ok().json(ballots))
}

/// Mint a judge token and the login URL embedded in the tablet QR code.
#[utoipa::path(
    post,
    path = "/api/live/{meet_code}/judge-token",
    request_body = JudgeTokenRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token issued", body = JudgeTokenResponse)
    ),
    tag = "live"
)]
pub async fn issue_judge_token(
    db: web::Data<Database>,
    tokens: web::Data<JudgeTokens>,
    config: web::Data<Config>,
    path: web::Path<String>,
    body: web::Json<JudgeTokenRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let meet = meet_by_code(&db, &path).await?;
    let role: JudgeRole = body.role.parse().map_err(WebError::BadRequest)?;
    let ttl = chrono::Duration::minutes(body.ttl_minutes.unwrap_or(12 * 60));

    let token = tokens
        .issue(body.judge_id, meet.meet_id, role, ttl)
        .map_err(|e| WebError::BadRequest(format!("cannot issue token: {e}")))?;
    let login_url = format!(
        "{}/judge/login?meet={}&token={}",
        config.public_url, meet.code, token
    );

    Ok(HttpResponse::Ok().json(JudgeTokenResponse { token, login_url }))
}
