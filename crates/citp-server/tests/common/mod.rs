//! Shared test fixtures: an in-memory media server device
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use citp_core::msex::{ClientInformationMessage, MsexMessage};
use citp_core::types::{
    ElementInformation, ElementKind, ElementLibraryInformation, ImageFormat, LayerStatus,
    LayerStatusFlags, LibraryId, LibraryType, VideoSourceFlags, VideoSourceInformation,
};
use citp_core::{CitpPacket, MsexVersion};
use citp_server::{
    CitpMediaServerService, Connection, ElementLibrary, FrameRequest, MediaServerDevice,
    ServiceConfig, ThumbnailImage, ThumbnailRequest, VideoFrame,
};

pub struct MockDevice {
    pub uuid: Uuid,
    pub libraries: BTreeMap<LibraryId, ElementLibrary>,
    pub sources: Vec<VideoSourceInformation>,
    /// Library numbers and element numbers whose thumbnails come back empty
    pub imageless: HashSet<u8>,
    /// `false` makes every video frame request come back empty
    pub has_frames: bool,
    pub thumbnail_calls: AtomicUsize,
    pub frame_calls: AtomicUsize,
}

pub fn media_element(number: u8) -> ElementInformation {
    ElementInformation {
        number,
        serial_number: u32::from(number),
        dmx_range_min: 0,
        dmx_range_max: 255,
        name: format!("clip {number}"),
        kind: ElementKind::Media {
            version_timestamp: 1_700_000_000,
            width: 1920,
            height: 1080,
            length: 750,
            fps: 25,
        },
    }
}

pub fn media_library(number: u8, elements: &[u8]) -> ElementLibrary {
    let id = LibraryId::ROOT.child(number).unwrap();
    ElementLibrary {
        library_type: LibraryType::Media,
        information: ElementLibraryInformation {
            id,
            serial_number: u32::from(number) * 100,
            dmx_range_min: 0,
            dmx_range_max: 255,
            name: format!("library {number}"),
            library_count: 0,
            element_count: elements.len() as u16,
        },
        elements: elements.iter().map(|&n| (n, media_element(n))).collect(),
    }
}

pub fn effects_library(number: u8) -> ElementLibrary {
    let id = LibraryId::ROOT.child(number).unwrap();
    ElementLibrary {
        library_type: LibraryType::Effects,
        information: ElementLibraryInformation {
            id,
            serial_number: u32::from(number) * 100,
            dmx_range_min: 0,
            dmx_range_max: 255,
            name: format!("effects {number}"),
            library_count: 0,
            element_count: 1,
        },
        elements: [(
            1u8,
            ElementInformation {
                number: 1,
                serial_number: 1,
                dmx_range_min: 0,
                dmx_range_max: 255,
                name: "strobe".into(),
                kind: ElementKind::Effect {
                    parameter_names: vec!["rate".into()],
                },
            },
        )]
        .into_iter()
        .collect(),
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        let mut libraries = BTreeMap::new();
        for library in [
            media_library(1, &[1, 2, 3]),
            media_library(2, &[1]),
            media_library(3, &[4, 5]),
            media_library(4, &[1]),
        ] {
            libraries.insert(library.information.id, library);
        }
        let effects = effects_library(9);
        libraries.insert(effects.information.id, effects);

        MockDevice {
            uuid: Uuid::new_v4(),
            libraries,
            sources: vec![VideoSourceInformation {
                source_identifier: 1,
                source_name: "Main out".into(),
                physical_output: Some(0),
                layer_number: None,
                flags: VideoSourceFlags::NONE,
                width: 1920,
                height: 1080,
            }],
            imageless: HashSet::new(),
            has_frames: true,
            thumbnail_calls: AtomicUsize::new(0),
            frame_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaServerDevice for MockDevice {
    fn peer_name(&self) -> String {
        "Test Server".into()
    }

    fn peer_state(&self) -> String {
        "Online".into()
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn product_name(&self) -> String {
        "Mock Media Server".into()
    }

    fn product_version(&self) -> (u8, u8, u8) {
        (1, 4, 2)
    }

    fn supported_versions(&self) -> Vec<MsexVersion> {
        MsexVersion::ALL.to_vec()
    }

    fn supported_library_types(&self) -> Vec<LibraryType> {
        vec![LibraryType::Media, LibraryType::Effects]
    }

    fn supported_thumbnail_formats(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Rgb8, ImageFormat::Jpeg]
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
            media_name: "clip 1".into(),
            media_position: 0,
            media_length: 750,
            media_fps: 25,
            flags: LayerStatusFlags::MEDIA_PLAYING,
        }]
    }

    fn element_libraries(&self) -> BTreeMap<LibraryId, ElementLibrary> {
        self.libraries.clone()
    }

    async fn library_thumbnail(
        &self,
        request: ThumbnailRequest,
        library: &ElementLibraryInformation,
    ) -> Option<ThumbnailImage> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        if library
            .id
            .library_number()
            .map_or(false, |n| self.imageless.contains(&n))
        {
            return None;
        }
        Some(ThumbnailImage {
            format: request.format,
            width: request.width,
            height: request.height,
            data: Bytes::from_static(&[0xAA, 0xBB, 0xCC]),
        })
    }

    async fn element_thumbnail(
        &self,
        request: ThumbnailRequest,
        _library: &ElementLibraryInformation,
        element: &ElementInformation,
    ) -> Option<ThumbnailImage> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        if self.imageless.contains(&element.number) {
            return None;
        }
        Some(ThumbnailImage {
            format: request.format,
            width: request.width,
            height: request.height,
            data: Bytes::from_static(&[0x11, 0x22]),
        })
    }

    fn video_sources(&self) -> Vec<VideoSourceInformation> {
        self.sources.clone()
    }

    async fn video_frame(&self, request: FrameRequest) -> Option<VideoFrame> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        if !self.has_frames {
            return None;
        }
        Some(VideoFrame {
            format: request.format,
            width: request.width,
            height: request.height,
            data: Bytes::from_static(&[0xF0, 0x0D]),
        })
    }
}

pub fn client_addr() -> SocketAddr {
    "10.1.2.3:49152".parse().unwrap()
}

/// Encodes a single-part datagram for `message` at `version`.
pub fn msex_datagram(version: MsexVersion, request_index: u16, message: MsexMessage) -> Vec<u8> {
    let packet = CitpPacket::Msex { version, message };
    packet.to_datagrams(request_index, None).unwrap()[0].to_vec()
}

/// Runs the client information handshake so the connection is active.
pub async fn activate(service: &CitpMediaServerService, connection: &mut Connection) {
    let datagram = msex_datagram(
        MsexVersion::V1_2,
        1,
        MsexMessage::ClientInformation(ClientInformationMessage {
            supported_versions: MsexVersion::ALL.to_vec(),
        }),
    );
    let responses = service.handle_datagram(connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1, "expected server information response");
}

/// Builds a service over a mock device with default config.
pub fn service_with(device: MockDevice, config: ServiceConfig) -> (CitpMediaServerService, Arc<MockDevice>) {
    let device = Arc::new(device);
    let dyn_device: Arc<dyn MediaServerDevice> = device.clone();
    let service = CitpMediaServerService::new(dyn_device, config).unwrap();
    (service, device)
}
