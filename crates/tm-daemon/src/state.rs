//! Shared runtime state for tm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. All market state lives
//! in the [`MarketEngine`]; this module only adds the SSE bus and build info.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tm_engine::MarketEngine;
use tm_schemas::{MarketStatus, Offer, Transfer};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const BUS_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// One SSE event. The serialized form is the event `data`; `event_name` is its `event:` line.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Offer(Offer),
    Transfer { transfer: Transfer, removed: bool },
    Market(MarketStatus),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Offer(_) => "offer",
            BusMsg::Transfer { .. } => "transfer",
            BusMsg::Market(_) => "market",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

/// Service name and crate version, reported by `/v1/health`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl BuildInfo {
    const CURRENT: Self = Self {
        service: "tm-daemon",
        version: env!("CARGO_PKG_VERSION"),
    };
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// SSE fan-out. Lagging subscribers lose the oldest events.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine: Arc<MarketEngine>,
    started: Instant,
}

impl AppState {
    pub fn new(engine: Arc<MarketEngine>) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            bus,
            build: BuildInfo::CURRENT,
            engine,
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// No subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }

    pub fn log_line(&self, level: &str, msg: impl Into<String>) {
        self.publish(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }

    /// Emit a heartbeat on the bus every `every` so idle SSE clients can
    /// detect a dead connection.
    pub fn spawn_heartbeat(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let st = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                st.publish(BusMsg::Heartbeat {
                    ts_millis: chrono::Utc::now().timestamp_millis(),
                });
            }
        })
    }

    /// Periodic remote refresh whose results are also reported on the bus.
    pub fn spawn_refresh_tick(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let st = Arc::clone(self);
        tm_engine::spawn_refresh_tick(Arc::clone(&self.engine), every, move |engine, result| {
            match result {
                Ok(outcome) => {
                    st.publish(BusMsg::Market(engine.market_status()));
                    if let Some(d) = &outcome.gate_disagreement {
                        st.log_line(
                            "WARN",
                            format!(
                                "market gate disagreement: local is_open={} remote is_open={}",
                                d.local_is_open, d.remote_is_open
                            ),
                        );
                    }
                }
                Err(err) => st.log_line("WARN", format!("could not sync: {err}")),
            }
        })
    }
}
