//! Event bridge: turns bus events into JSON wire frames.
//!
//! Frames fan out on a broadcast channel for websocket consumers and are
//! optionally appended to a JSONL transcript, one frame per line. An
//! [`EventFilter`] narrows what is forwarded.

use std::path::Path;

use chrono::{DateTime, Utc};
use curia::events::{DebateEvent, EventBus, EventFilter, FilteredTap};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Capacity of the outgoing frame channel.
const FRAME_CAPACITY: usize = 1024;

/// Error type for the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Transcript I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Bridge task failed: {0}")]
    Task(String),
}

/// One event as sent to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Payload fields without the variant tag.
    pub data: serde_json::Value,
}

impl WireEvent {
    pub fn from_event(event: &DebateEvent) -> Result<Self, serde_json::Error> {
        let mut data = serde_json::to_value(&event.payload)?;
        if let Some(fields) = data.as_object_mut() {
            fields.remove("event");
        }
        Ok(Self {
            event_type: event.event_type().to_string(),
            source: event.source.clone(),
            target: event.target.clone(),
            timestamp: event.timestamp,
            data,
        })
    }
}

/// Background task forwarding bus events as frames.
pub struct EventBridge {
    frames: broadcast::Sender<String>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<usize, BridgeError>>,
}

impl EventBridge {
    /// Start forwarding every event published on `bus` from now on.
    pub async fn start(bus: &EventBus, transcript: Option<&Path>) -> Result<Self, BridgeError> {
        Self::start_filtered(bus, transcript, EventFilter::new()).await
    }

    /// Start forwarding the events `filter` selects.
    pub async fn start_filtered(
        bus: &EventBus,
        transcript: Option<&Path>,
        filter: EventFilter,
    ) -> Result<Self, BridgeError> {
        if !filter.is_open() {
            debug!(?filter, "Bridge filter installed");
        }
        let writer = match transcript {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                info!(path = %path.display(), "Writing transcript");
                Some(BufWriter::new(File::create(path).await?))
            }
            None => None,
        };

        let (frames, _) = broadcast::channel(FRAME_CAPACITY);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(pump(bus.tap_filtered(filter), frames.clone(), writer, shutdown_rx));

        Ok(Self {
            frames,
            shutdown,
            task,
        })
    }

    /// Receive serialized frames, e.g. to forward over a websocket.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<String> {
        self.frames.subscribe()
    }

    /// Flush pending events and stop. Returns the number of frames emitted.
    pub async fn shutdown(self) -> Result<usize, BridgeError> {
        // The task may already have exited if the bus was dropped
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| BridgeError::Task(e.to_string()))?
    }
}

async fn emit(
    event: &DebateEvent,
    frames: &broadcast::Sender<String>,
    writer: &mut Option<BufWriter<File>>,
) -> Result<(), BridgeError> {
    let frame = serde_json::to_string(&WireEvent::from_event(event)?)?;
    if let Some(writer) = writer.as_mut() {
        writer.write_all(frame.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    let consumers = frames.send(frame).unwrap_or(0);
    trace!(event_type = event.event_type(), consumers, "Frame emitted");
    Ok(())
}

async fn pump(
    mut events: FilteredTap,
    frames: broadcast::Sender<String>,
    mut writer: Option<BufWriter<File>>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<usize, BridgeError> {
    let mut emitted = 0;
    loop {
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => {
                    emit(&event, &frames, &mut writer).await?;
                    emitted += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Bridge fell behind the bus; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                loop {
                    match events.try_recv() {
                        Ok(event) => {
                            emit(&event, &frames, &mut writer).await?;
                            emitted += 1;
                        }
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(skipped, "Bridge fell behind the bus; events dropped");
                        }
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }
                break;
            }
        }
    }

    if let Some(writer) = writer.as_mut() {
        writer.flush().await?;
    }
    debug!(emitted, "Bridge stopped");
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curia::events::EventPayload;

    #[test]
    fn test_wire_event_shape() {
        let event = DebateEvent::new(
            "cato",
            EventPayload::VoteRequested {
                topic: "carthage".to_string(),
                title: "War with Carthage".to_string(),
            },
        )
        .targeting("scipio");

        let wire = WireEvent::from_event(&event).unwrap();
        assert_eq!(wire.event_type, "debate.vote_requested");
        assert_eq!(wire.target.as_deref(), Some("scipio"));
        assert_eq!(wire.data["topic"], "carthage");
        assert!(wire.data.get("event").is_none());

        let json: serde_json::Value = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["type"], "debate.vote_requested");
        assert_eq!(json["source"], "cato");
    }

    #[test]
    fn test_untargeted_frame_omits_target() {
        let event = DebateEvent::from_senate(EventPayload::AgendaAnnounced { topics: vec![] });
        let json = serde_json::to_value(WireEvent::from_event(&event).unwrap()).unwrap();
        assert!(json.get("target").is_none());
        assert_eq!(json["source"], curia::senator::SENATE_SOURCE);
    }
}
