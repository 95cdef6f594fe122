//! Stream request scheduling
//!
//! Tracks the latest stream request per (peer, source) and turns the live
//! ones into stream-frame packets on a fixed cadence. Frame production is
//! fanned out per request, so a slow or empty source never holds back the
//! others; an expired request is dropped, not serviced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use citp_core::msex::{MsexMessage, RequestStreamMessage, StreamFrameMessage};
use citp_core::types::ImageFormat;
use citp_core::{CitpPacket, MsexVersion};

use crate::device::{FrameRequest, MediaServerDevice};
use crate::peers::Peer;

/// One outstanding stream request
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub peer: Arc<Peer>,
    pub version: MsexVersion,
    pub source_identifier: u16,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub fps: u8,
    pub expires_at: Instant,
}

/// Shared stream request table
#[derive(Debug)]
pub struct StreamManager {
    requests: Mutex<HashMap<(Uuid, u16), StreamRequest>>,
    server_uuid: Uuid,
}

impl StreamManager {
    pub fn new(server_uuid: Uuid) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            server_uuid,
        }
    }

    /// Registers a request, superseding any prior one from the same peer
    /// for the same source.
    pub fn add_request(
        &self,
        peer: Arc<Peer>,
        version: MsexVersion,
        message: &RequestStreamMessage,
    ) {
        let request = StreamRequest {
            peer: Arc::clone(&peer),
            version,
            source_identifier: message.source_identifier,
            format: message.format,
            width: message.width,
            height: message.height,
            fps: message.fps,
            expires_at: Instant::now() + Duration::from_secs(u64::from(message.timeout_secs)),
        };
        debug!(
            peer = %peer.name,
            source = message.source_identifier,
            fps = message.fps,
            timeout = message.timeout_secs,
            "stream request registered"
        );
        self.requests
            .lock()
            .insert((peer.id, message.source_identifier), request);
    }

    /// Number of unexpired requests
    pub fn live_requests(&self) -> usize {
        let now = Instant::now();
        self.requests
            .lock()
            .values()
            .filter(|r| r.expires_at > now)
            .count()
    }

    /// Drops expired requests and produces one frame packet per live
    /// request, optionally restricted to a single source.
    ///
    /// A source with no frame available is skipped without affecting the
    /// other requests in the same tick.
    pub async fn collect_frames(
        &self,
        device: &dyn MediaServerDevice,
        source: Option<u16>,
    ) -> Vec<(Arc<Peer>, CitpPacket)> {
        let live: Vec<StreamRequest> = {
            let now = Instant::now();
            let mut requests = self.requests.lock();
            requests.retain(|_, r| r.expires_at > now);
            requests
                .values()
                .filter(|r| source.map_or(true, |s| r.source_identifier == s))
                .cloned()
                .collect()
        };

        let pending = live.into_iter().map(|request| async move {
            let frame = device
                .video_frame(FrameRequest {
                    source_identifier: request.source_identifier,
                    width: request.width,
                    height: request.height,
                    format: request.format,
                    fps: request.fps,
                    version: request.version,
                })
                .await?;
            Some((
                Arc::clone(&request.peer),
                CitpPacket::Msex {
                    version: request.version,
                    message: MsexMessage::StreamFrame(StreamFrameMessage {
                        server_uuid: self.server_uuid.to_string(),
                        source_identifier: request.source_identifier,
                        format: frame.format,
                        width: frame.width,
                        height: frame.height,
                        data: frame.data,
                    }),
                },
            ))
        });
        join_all(pending).await.into_iter().flatten().collect()
    }

    /// Runs the production loop at `tick`, forwarding frames to `sink`.
    ///
    /// Runs until the sink closes. The loop lives on its own task and
    /// never blocks connection dispatch.
    pub async fn run_timer(
        self: Arc<Self>,
        device: Arc<dyn MediaServerDevice>,
        tick: Duration,
        sink: mpsc::Sender<(Arc<Peer>, CitpPacket)>,
    ) {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            for frame in self.collect_frames(device.as_ref(), None).await {
                if sink.send(frame).await.is_err() {
                    debug!("frame sink closed, stopping stream timer");
                    return;
                }
            }
        }
    }
}
