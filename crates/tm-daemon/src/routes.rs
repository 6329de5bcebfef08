//! Axum router and all HTTP handlers for tm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every mutating route requires the `x-actor-id` header.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tm_audit::ActivityFilter;
use tm_negotiation::{NegotiationError, OfferFilter};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ActionableQuery, ActionableResponse, AppendActivityRequest, ClearedResponse,
        CreateOfferRequest, ErrorResponse, GateRefusedResponse, HealthResponse, MarketResponse,
        RefreshFailedResponse, SeenResponse, TransitionRequest,
    },
    state::{AppState, BusMsg},
};

pub const ACTOR_HEADER: &str = "x-actor-id";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/market", get(market_get))
        .route("/v1/market/open", post(market_open))
        .route("/v1/market/close", post(market_close))
        .route("/v1/offers", get(offers_list).post(offers_create))
        .route("/v1/offers/:id", get(offer_get))
        .route("/v1/offers/:id/transition", post(offer_transition))
        .route("/v1/transfers", get(transfers_list))
        .route("/v1/transfers/:id", get(transfer_get).delete(transfer_delete))
        .route("/v1/sync/refresh", post(sync_refresh))
        .route("/v1/sync/status", get(sync_status))
        .route("/v1/notifications", axum::routing::delete(notifications_clear))
        .route("/v1/notifications/:offer_id/seen", post(notifications_seen))
        .route("/v1/notifications/actionable", get(notifications_actionable))
        .route(
            "/v1/activity",
            get(activity_list).post(activity_append).delete(activity_clear),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error_body(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

/// Trimmed, non-empty `x-actor-id`, or a 400.
fn actor_id(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            error_body(
                StatusCode::BAD_REQUEST,
                format!("missing {ACTOR_HEADER} header"),
            )
        })
}

fn negotiation_error(err: NegotiationError) -> Response {
    let status = match &err {
        NegotiationError::MarketClosed => {
            return (
                StatusCode::FORBIDDEN,
                Json(GateRefusedResponse {
                    error: format!("GATE_REFUSED: {err}"),
                    gate: "market_open".to_string(),
                }),
            )
                .into_response();
        }
        NegotiationError::InvalidTransition { .. } => StatusCode::CONFLICT,
        NegotiationError::InvalidAmount { .. } | NegotiationError::InvalidOffer(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        NegotiationError::OfferNotFound(_) | NegotiationError::TransferNotFound(_) => {
            StatusCode::NOT_FOUND
        }
    };
    error_body(status, err.to_string())
}

fn storage_error(err: anyhow::Error) -> Response {
    warn!(error = %err, "local store write failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            uptime_secs: st.uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/market
// ---------------------------------------------------------------------------

pub(crate) async fn market_get(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(MarketResponse::new(
        st.engine.market_status(),
        st.engine.sync_enabled(),
    ))
}

pub(crate) async fn market_open(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    set_market(&st, &headers, true)
}

pub(crate) async fn market_close(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    set_market(&st, &headers, false)
}

fn set_market(st: &AppState, headers: &HeaderMap, open: bool) -> Response {
    let actor = match actor_id(headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let status = st.engine.set_open(open, &actor);
    info!(actor = %actor, is_open = open, "market toggle");
    st.publish(BusMsg::Market(status));
    st.log_line(
        "INFO",
        format!("market {} by {actor}", if open { "opened" } else { "closed" }),
    );
    (
        StatusCode::OK,
        Json(MarketResponse::new(status, st.engine.sync_enabled())),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// /v1/offers
// ---------------------------------------------------------------------------

pub(crate) async fn offers_list(
    State(st): State<Arc<AppState>>,
    Query(filter): Query<OfferFilter>,
) -> impl IntoResponse {
    Json(st.engine.list_offers(&filter))
}

pub(crate) async fn offers_create(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOfferRequest>,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match st.engine.create_offer(req.into(), &actor) {
        Ok(offer) => {
            st.publish(BusMsg::Offer(offer.clone()));
            (StatusCode::CREATED, Json(offer)).into_response()
        }
        Err(err) => negotiation_error(err),
    }
}

pub(crate) async fn offer_get(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.engine.get_offer(id) {
        Some(offer) => (StatusCode::OK, Json(offer)).into_response(),
        None => negotiation_error(NegotiationError::OfferNotFound(id)),
    }
}

pub(crate) async fn offer_transition(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match st
        .engine
        .transition_offer(id, req.status, &req.changes(), &actor)
    {
        Ok(outcome) => {
            st.publish(BusMsg::Offer(outcome.offer.clone()));
            if let Some(t) = &outcome.transfer {
                st.publish(BusMsg::Transfer {
                    transfer: t.clone(),
                    removed: false,
                });
            }
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => negotiation_error(err),
    }
}

// ---------------------------------------------------------------------------
// /v1/transfers
// ---------------------------------------------------------------------------

pub(crate) async fn transfers_list(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(st.engine.list_transfers())
}

pub(crate) async fn transfer_get(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.engine.get_transfer(id) {
        Some(t) => (StatusCode::OK, Json(t)).into_response(),
        None => negotiation_error(NegotiationError::TransferNotFound(id)),
    }
}

pub(crate) async fn transfer_delete(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match st.engine.remove_transfer(id, &actor) {
        Ok(removed) => {
            st.publish(BusMsg::Transfer {
                transfer: removed.clone(),
                removed: true,
            });
            (StatusCode::OK, Json(removed)).into_response()
        }
        Err(err) => negotiation_error(err),
    }
}

// ---------------------------------------------------------------------------
// /v1/sync
// ---------------------------------------------------------------------------

pub(crate) async fn sync_refresh(State(st): State<Arc<AppState>>) -> Response {
    if !st.engine.sync_enabled() {
        return error_body(StatusCode::CONFLICT, "remote sync is disabled");
    }
    match st.engine.refresh().await {
        Ok(outcome) => {
            st.publish(BusMsg::Market(st.engine.market_status()));
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => {
            st.log_line("WARN", format!("could not sync: {err}"));
            (
                StatusCode::BAD_GATEWAY,
                Json(RefreshFailedResponse {
                    error: err.to_string(),
                    local_cache_preserved: true,
                }),
            )
                .into_response()
        }
    }
}

pub(crate) async fn sync_status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(st.engine.sync_status())
}

// ---------------------------------------------------------------------------
// /v1/notifications
// ---------------------------------------------------------------------------

pub(crate) async fn notifications_seen(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(offer_id): Path<Uuid>,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match st.engine.mark_seen(&actor, offer_id) {
        Ok(newly_seen) => (
            StatusCode::OK,
            Json(SeenResponse {
                offer_id,
                newly_seen,
            }),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

pub(crate) async fn notifications_clear(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match st.engine.clear_seen(&actor) {
        Ok(()) => (StatusCode::OK, Json(ClearedResponse { cleared: true })).into_response(),
        Err(err) => storage_error(err),
    }
}

pub(crate) async fn notifications_actionable(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ActionableQuery>,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let actionable = st.engine.actionable_for_club(&actor, &q.club);
    (
        StatusCode::OK,
        Json(ActionableResponse {
            actor_id: actor,
            club: q.club,
            actionable,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// /v1/activity
// ---------------------------------------------------------------------------

pub(crate) async fn activity_list(
    State(st): State<Arc<AppState>>,
    Query(filter): Query<ActivityFilter>,
) -> impl IntoResponse {
    Json(st.engine.list_activity(&filter))
}

pub(crate) async fn activity_append(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AppendActivityRequest>,
) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let entry = st.engine.append_activity(&actor, req.kind, req.details);
    (StatusCode::CREATED, Json(entry)).into_response()
}

pub(crate) async fn activity_clear(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match actor_id(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match st.engine.clear_activity() {
        Ok(()) => {
            info!(actor = %actor, "activity log cleared");
            (StatusCode::OK, Json(ClearedResponse { cleared: true })).into_response()
        }
        Err(err) => storage_error(err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
