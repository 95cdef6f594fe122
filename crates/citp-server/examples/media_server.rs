//! Minimal CITP media server over TCP.
//!
//! Binds a TCP listener, services CITP connections with a small demo
//! device and runs the stream frame timer. Point a CITP-capable console
//! at it:
//!
//! ```text
//! cargo run --example media_server -- 0.0.0.0:4810
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use citp_core::types::{
    ElementInformation, ElementKind, ElementLibraryInformation, ImageFormat, LayerStatus,
    LayerStatusFlags, LibraryId, LibraryType, VideoSourceFlags, VideoSourceInformation,
};
use citp_core::{Header, MsexVersion};
use citp_server::{
    CitpMediaServerService, Connection, ElementLibrary, FrameRequest, MediaServerDevice,
    ServiceConfig, ThumbnailImage, ThumbnailRequest, VideoFrame,
};

struct DemoDevice {
    uuid: Uuid,
}

#[async_trait]
impl MediaServerDevice for DemoDevice {
    fn peer_name(&self) -> String {
        "Demo Media Server".into()
    }

    fn peer_state(&self) -> String {
        "Online".into()
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn product_name(&self) -> String {
        "citp-server demo".into()
    }

    fn product_version(&self) -> (u8, u8, u8) {
        (0, 4, 0)
    }

    fn supported_versions(&self) -> Vec<MsexVersion> {
        MsexVersion::ALL.to_vec()
    }

    fn supported_library_types(&self) -> Vec<LibraryType> {
        vec![LibraryType::Media]
    }

    fn supported_thumbnail_formats(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Rgb8]
    }

    fn supported_stream_formats(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Rgb8]
    }

    fn layer_dmx_sources(&self) -> Vec<String> {
        vec!["ArtNet/0/0/1".into()]
    }

    fn layer_statuses(&self) -> Vec<LayerStatus> {
        vec![LayerStatus {
            layer_number: 0,
            physical_output: 0,
            media_library: LibraryId::ROOT.child(1).unwrap(),
            media_number: 1,
            media_name: "gradient".into(),
            media_position: 0,
            media_length: 300,
            media_fps: 30,
            flags: LayerStatusFlags::MEDIA_PLAYING | LayerStatusFlags::MEDIA_PLAYBACK_LOOPING,
        }]
    }

    fn element_libraries(&self) -> BTreeMap<LibraryId, ElementLibrary> {
        let id = LibraryId::ROOT.child(1).expect("level 1 is always valid");
        let elements: BTreeMap<u8, ElementInformation> = (1..=3u8)
            .map(|number| {
                (
                    number,
                    ElementInformation {
                        number,
                        serial_number: u32::from(number),
                        dmx_range_min: 0,
                        dmx_range_max: 255,
                        name: format!("gradient {number}"),
                        kind: ElementKind::Media {
                            version_timestamp: 1_700_000_000,
                            width: 640,
                            height: 360,
                            length: 300,
                            fps: 30,
                        },
                    },
                )
            })
            .collect();
        let library = ElementLibrary {
            library_type: LibraryType::Media,
            information: ElementLibraryInformation {
                id,
                serial_number: 1,
                dmx_range_min: 0,
                dmx_range_max: 255,
                name: "Demo clips".into(),
                library_count: 0,
                element_count: elements.len() as u16,
            },
            elements,
        };
        BTreeMap::from([(id, library)])
    }

    async fn library_thumbnail(
        &self,
        request: ThumbnailRequest,
        _library: &ElementLibraryInformation,
    ) -> Option<ThumbnailImage> {
        Some(solid_color(request, 0x20))
    }

    async fn element_thumbnail(
        &self,
        request: ThumbnailRequest,
        _library: &ElementLibraryInformation,
        element: &ElementInformation,
    ) -> Option<ThumbnailImage> {
        Some(solid_color(request, element.number.wrapping_mul(40)))
    }

    fn video_sources(&self) -> Vec<VideoSourceInformation> {
        vec![VideoSourceInformation {
            source_identifier: 1,
            source_name: "Demo output".into(),
            physical_output: Some(0),
            layer_number: None,
            flags: VideoSourceFlags::NONE,
            width: 640,
            height: 360,
        }]
    }

    async fn video_frame(&self, request: FrameRequest) -> Option<VideoFrame> {
        let px = usize::from(request.width) * usize::from(request.height) * 3;
        Some(VideoFrame {
            format: ImageFormat::Rgb8,
            width: request.width,
            height: request.height,
            data: Bytes::from(vec![0x40u8; px.min(60_000)]),
        })
    }
}

fn solid_color(request: ThumbnailRequest, value: u8) -> ThumbnailImage {
    let px = usize::from(request.width) * usize::from(request.height) * 3;
    ThumbnailImage {
        format: ImageFormat::Rgb8,
        width: request.width,
        height: request.height,
        data: Bytes::from(vec![value; px.min(60_000)]),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:4810".to_owned());

    let device = Arc::new(DemoDevice {
        uuid: Uuid::new_v4(),
    });
    let service = Arc::new(CitpMediaServerService::new(device, ServiceConfig::default())?);

    // frames produced by the 60 Hz timer are logged here; a real host
    // forwards them over its streaming socket
    let (frame_tx, mut frame_rx) = mpsc::channel(64);
    service.spawn_stream_timer(frame_tx);
    tokio::spawn(async move {
        while let Some((peer, _packet)) = frame_rx.recv().await {
            debug!(peer = %peer.name, "frame produced");
        }
    });

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "CITP media server listening");

    loop {
        let (socket, peer_addr) = listener.accept().await?;
        info!(%peer_addr, "connection accepted");
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(service, socket, peer_addr).await {
                warn!(%peer_addr, error = %e, "connection ended");
            }
        });
    }
}

async fn serve_connection(
    service: Arc<CitpMediaServerService>,
    mut socket: TcpStream,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let mut connection = Connection::new(addr);
    for datagram in service.connection_opened(&connection)? {
        socket.write_all(&datagram).await?;
    }

    let mut buf = BytesMut::with_capacity(8192);
    loop {
        while let Some(len) = Header::check_complete(&buf) {
            let packet = buf.split_to(len);
            let responses = service.handle_datagram(&mut connection, &packet).await?;
            for response in responses {
                socket.write_all(&response).await?;
            }
        }
        if socket.read_buf(&mut buf).await? == 0 {
            service.connection_closed(&connection);
            return Ok(());
        }
    }
}
