//! Media server dispatch
//!
//! Interprets decoded packets on behalf of a media server device,
//! enforcing capability flags and producing response packets. One service
//! instance is shared by every connection; per-connection state lives in
//! [`Connection`].
//!
//! Error policy follows the protocol: header-level failures are
//! connection-fatal, unrecognised MSEX traffic is negative-acknowledged,
//! and missing items in batch requests are logged and skipped without
//! aborting the batch.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use citp_core::envelope::Header;
use citp_core::fourcc::{FourCC, LayerType};
use citp_core::io::Reader;
use citp_core::msex::{
    ClientInformationMessage, EffectElementInformationMessage, ElementLibraryInformationMessage,
    ElementLibraryThumbnailMessage, ElementLibraryUpdatedMessage, ElementThumbnailMessage,
    GenericElementInformationMessage, GetElementInformationMessage,
    GetElementLibraryInformationMessage, GetElementLibraryThumbnailMessage,
    GetElementThumbnailMessage, MediaElementInformationMessage, MsexMessage, MsexMessageType,
    NegativeAcknowledgeMessage, RequestStreamMessage, Selection, ServerInformationMessage,
    VideoSourcesMessage,
};
use citp_core::packet::split_msex_body;
use citp_core::pinf::{PeerNameMessage, PinfMessage, PinfMessageType};
use citp_core::types::{
    ElementInformation, ElementLibraryUpdatedFlags, LibraryId, LibraryType, ThumbnailFlags,
};
use citp_core::{CitpPacket, Error as ProtocolError, MsexVersion};

use crate::config::{ServiceConfig, ServiceFlags};
use crate::connection::{Connection, ConnectionState};
use crate::device::{MediaServerDevice, ThumbnailRequest};
use crate::error::{Result, ServiceError};
use crate::peers::{Peer, PeerRegistry};
use crate::streams::StreamManager;

/// Highest element or library number addressable by an "all" request
const MAX_REQUESTABLE_NUMBER: u8 = 254;

/// CITP protocol engine for one media server device
pub struct CitpMediaServerService {
    device: Arc<dyn MediaServerDevice>,
    config: ServiceConfig,
    peers: PeerRegistry,
    streams: Arc<StreamManager>,
}

impl CitpMediaServerService {
    pub fn new(device: Arc<dyn MediaServerDevice>, config: ServiceConfig) -> Result<Self> {
        if config.max_packet_size <= citp_core::HEADER_SIZE {
            return Err(ServiceError::Config(format!(
                "max_packet_size {} leaves no room for a payload",
                config.max_packet_size
            )));
        }
        let streams = Arc::new(StreamManager::new(device.uuid()));
        Ok(Self {
            device,
            config,
            peers: PeerRegistry::new(),
            streams,
        })
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn streams(&self) -> &Arc<StreamManager> {
        &self.streams
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn MediaServerDevice> {
        &self.device
    }

    /// Datagrams to send when a connection opens: the server announces
    /// its own peer name first.
    pub fn connection_opened(&self, connection: &Connection) -> Result<Vec<Bytes>> {
        info!(addr = %connection.addr, "connection opened");
        let packet = CitpPacket::Pinf(PinfMessage::PeerName(PeerNameMessage {
            name: self.device.peer_name(),
        }));
        Ok(packet.to_datagrams(0, Some(self.config.max_packet_size))?)
    }

    pub fn connection_closed(&self, connection: &Connection) {
        info!(addr = %connection.addr, "connection closed");
    }

    /// Handles one received datagram, returning encoded responses.
    ///
    /// An error return means the connection is no longer trustworthy
    /// (bad cookie, wrong wire version, truncated data) and should be
    /// torn down; service-wide state is unaffected either way.
    pub async fn handle_datagram(
        &self,
        connection: &mut Connection,
        data: &[u8],
    ) -> Result<Vec<Bytes>> {
        connection.reassembler.prune(self.config.reassembly_ttl);

        let (header, part) = Header::decode(data)?;
        let Some(body) = connection.reassembler.push(&header, part)? else {
            return Ok(Vec::new()); // waiting for the remaining parts
        };

        let responses = self.dispatch(connection, &header, &body).await?;
        let mut out = Vec::new();
        for packet in responses {
            out.extend(
                packet.to_datagrams(header.request_index, Some(self.config.max_packet_size))?,
            );
        }
        Ok(out)
    }

    async fn dispatch(
        &self,
        connection: &mut Connection,
        header: &Header,
        body: &[u8],
    ) -> Result<Vec<CitpPacket>> {
        match header.layer {
            LayerType::PeerInformation => {
                let mut r = Reader::new(body);
                let id = r.fourcc()?;
                match PinfMessageType::from_id(id) {
                    Ok(message_type) => {
                        let message = PinfMessage::decode(message_type, &mut r)?;
                        Ok(self.handle_pinf(connection, message))
                    }
                    Err(_) => {
                        debug!(addr = %connection.addr, %id, "unrecognised PINF message type");
                        Ok(Vec::new())
                    }
                }
            }
            LayerType::MediaServerExtensions => {
                let (preamble, payload) = match split_msex_body(body) {
                    Ok(split) => split,
                    Err(ProtocolError::UnsupportedVersion { major, minor }) => {
                        warn!(
                            addr = %connection.addr,
                            major, minor,
                            "ignoring MSEX message at unsupported version"
                        );
                        return Ok(Vec::new());
                    }
                    Err(e) => return Err(e.into()),
                };
                match MsexMessageType::from_id(preamble.message_type) {
                    Ok(message_type) => {
                        let mut r = Reader::new(payload);
                        let message = MsexMessage::decode(message_type, preamble.version, &mut r)?;
                        self.handle_msex(connection, preamble.version, message).await
                    }
                    Err(_) => {
                        // a wire-unknown type still gets a NACK, never a
                        // silent drop
                        warn!(
                            addr = %connection.addr,
                            id = %preamble.message_type,
                            "unrecognised MSEX message type"
                        );
                        Ok(vec![nack(preamble.version, preamble.message_type)])
                    }
                }
            }
            other => {
                debug!(addr = %connection.addr, layer = ?other, "ignoring message for unhandled layer");
                Ok(Vec::new())
            }
        }
    }

    fn handle_pinf(&self, connection: &mut Connection, message: PinfMessage) -> Vec<CitpPacket> {
        match message {
            PinfMessage::PeerName(m) => {
                let peer = self.peers.find_or_add(&m.name, connection.addr.ip());
                info!(addr = %connection.addr, peer = %peer.name, "peer name announced");
                connection.peer = Some(peer);
            }
            PinfMessage::PeerLocation(m) => {
                debug!(peer = %m.name, state = %m.state, "peer location noted");
            }
        }
        Vec::new()
    }

    async fn handle_msex(
        &self,
        connection: &mut Connection,
        version: MsexVersion,
        message: MsexMessage,
    ) -> Result<Vec<CitpPacket>> {
        let message_type = message.message_type();
        if connection.state == ConnectionState::AwaitingClientInfo
            && message_type != MsexMessageType::ClientInformation
        {
            warn!(addr = %connection.addr, kind = ?message_type, "MSEX message before client information");
            return Ok(vec![nack(version, message_type.id())]);
        }

        match message {
            MsexMessage::ClientInformation(m) => {
                Ok(self.on_client_information(connection, version, m))
            }
            MsexMessage::GetElementLibraryInformation(m) => {
                Ok(self.on_get_library_information(connection, version, m))
            }
            MsexMessage::GetElementInformation(m) => {
                Ok(self.on_get_element_information(connection, version, m))
            }
            MsexMessage::GetElementLibraryThumbnail(m) => {
                Ok(self.on_get_library_thumbnails(connection, version, m).await)
            }
            MsexMessage::GetElementThumbnail(m) => {
                Ok(self.on_get_element_thumbnails(connection, version, m).await)
            }
            MsexMessage::GetVideoSources(_) => Ok(self.on_get_video_sources(connection, version)),
            MsexMessage::RequestStream(m) => Ok(self.on_request_stream(connection, version, m)),
            // everything a media server does not service is refused
            // explicitly
            other => Ok(vec![nack(version, other.message_type().id())]),
        }
    }

    fn on_client_information(
        &self,
        connection: &mut Connection,
        version: MsexVersion,
        message: ClientInformationMessage,
    ) -> Vec<CitpPacket> {
        info!(
            addr = %connection.addr,
            versions = ?message.supported_versions,
            "client information received"
        );
        connection.supported_versions = message.supported_versions;
        connection.state = ConnectionState::Active;

        let (product_version_major, product_version_minor, product_version_bugfix) =
            self.device.product_version();
        vec![CitpPacket::Msex {
            version,
            message: MsexMessage::ServerInformation(ServerInformationMessage {
                uuid: self.device.uuid().to_string(),
                product_name: self.device.product_name(),
                product_version_major,
                product_version_minor,
                product_version_bugfix,
                supported_versions: self.device.supported_versions(),
                supported_library_types: self.device.supported_library_types(),
                thumbnail_formats: self.device.supported_thumbnail_formats(),
                stream_formats: self.device.supported_stream_formats(),
                layer_dmx_sources: self.device.layer_dmx_sources(),
            }),
        }]
    }

    fn on_get_library_information(
        &self,
        connection: &Connection,
        version: MsexVersion,
        message: GetElementLibraryInformationMessage,
    ) -> Vec<CitpPacket> {
        if self
            .config
            .flags
            .contains(ServiceFlags::DISABLE_LIBRARY_INFORMATION)
        {
            return vec![nack(version, MsexMessageType::GetElementLibraryInformation.id())];
        }
        debug!(
            addr = %connection.addr,
            library_type = ?message.library_type,
            "element library information requested"
        );

        let parent = message.parent_id.unwrap_or(LibraryId::ROOT);
        let mut libraries = Vec::new();

        if !parent.can_have_children(version) {
            warn!(
                addr = %connection.addr,
                level = parent.level(),
                "library information requested under a parent that can have no children"
            );
        } else {
            let inventory = self.device.element_libraries();
            let numbers: Vec<u8> = match message.requested_libraries {
                Selection::All => (0..=MAX_REQUESTABLE_NUMBER).collect(),
                Selection::These(numbers) => numbers,
            };
            for number in numbers {
                let Ok(id) = parent.child(number) else {
                    continue;
                };
                // absent numbers are skipped, not errored
                let Some(library) = inventory.get(&id) else {
                    continue;
                };
                if library.library_type == message.library_type {
                    libraries.push(library.information.clone());
                }
            }
        }

        vec![CitpPacket::Msex {
            version,
            message: MsexMessage::ElementLibraryInformation(ElementLibraryInformationMessage {
                library_type: message.library_type,
                libraries,
            }),
        }]
    }

    fn on_get_element_information(
        &self,
        connection: &Connection,
        version: MsexVersion,
        message: GetElementInformationMessage,
    ) -> Vec<CitpPacket> {
        if self
            .config
            .flags
            .contains(ServiceFlags::DISABLE_ELEMENT_INFORMATION)
        {
            return vec![nack(version, MsexMessageType::GetElementInformation.id())];
        }
        debug!(
            addr = %connection.addr,
            id = ?message.library_id,
            "element information requested"
        );

        let inventory = self.device.element_libraries();
        let Some(library) = inventory.get(&message.library_id) else {
            warn!(
                addr = %connection.addr,
                id = ?message.library_id,
                "element information requested for unknown library"
            );
            return Vec::new();
        };

        let elements: Vec<ElementInformation> = match message.requested_elements {
            Selection::All => (0..=MAX_REQUESTABLE_NUMBER)
                .filter_map(|n| library.elements.get(&n).cloned())
                .collect(),
            Selection::These(numbers) => numbers
                .into_iter()
                .filter_map(|n| library.elements.get(&n).cloned())
                .collect(),
        };

        let response = match library.library_type {
            LibraryType::Media => {
                MsexMessage::MediaElementInformation(MediaElementInformationMessage {
                    library_id: message.library_id,
                    elements,
                })
            }
            LibraryType::Effects => {
                MsexMessage::EffectElementInformation(EffectElementInformationMessage {
                    library_id: message.library_id,
                    elements,
                })
            }
            other => {
                if version == MsexVersion::V1_0 {
                    warn!(
                        addr = %connection.addr,
                        library_type = ?other,
                        "generic element listing unavailable at MSEX 1.0"
                    );
                    return Vec::new();
                }
                MsexMessage::GenericElementInformation(GenericElementInformationMessage {
                    library_type: other,
                    library_id: message.library_id,
                    elements,
                })
            }
        };
        vec![CitpPacket::Msex {
            version,
            message: response,
        }]
    }

    async fn on_get_library_thumbnails(
        &self,
        connection: &Connection,
        version: MsexVersion,
        message: GetElementLibraryThumbnailMessage,
    ) -> Vec<CitpPacket> {
        if self
            .config
            .flags
            .contains(ServiceFlags::DISABLE_LIBRARY_THUMBNAILS)
        {
            return vec![nack(version, MsexMessageType::GetElementLibraryThumbnail.id())];
        }
        debug!(addr = %connection.addr, "library thumbnails requested");

        let inventory = self.device.element_libraries();
        let ids: Vec<LibraryId> = match message.requested_libraries {
            Selection::All => inventory
                .iter()
                .filter(|(_, library)| library.library_type == message.library_type)
                .map(|(id, _)| *id)
                .collect(),
            Selection::These(ids) => ids,
        };

        let request = ThumbnailRequest {
            width: message.width,
            height: message.height,
            format: message.format,
            preserve_aspect_ratio: message.flags.contains(ThumbnailFlags::PRESERVE_ASPECT_RATIO),
            version,
        };

        let mut packets = Vec::new();
        for id in ids {
            let Some(library) = inventory.get(&id) else {
                warn!(addr = %connection.addr, id = ?id, "thumbnail requested for unknown library");
                continue;
            };
            if library.library_type != message.library_type {
                warn!(
                    addr = %connection.addr,
                    id = ?id,
                    expected = ?message.library_type,
                    actual = ?library.library_type,
                    "thumbnail requested with mismatched library type"
                );
                continue;
            }
            let Some(image) = self
                .device
                .library_thumbnail(request, &library.information)
                .await
            else {
                warn!(addr = %connection.addr, id = ?id, "no thumbnail available for library");
                continue;
            };
            packets.push(CitpPacket::Msex {
                version,
                message: MsexMessage::ElementLibraryThumbnail(ElementLibraryThumbnailMessage {
                    library_type: message.library_type,
                    library_id: id,
                    format: image.format,
                    width: image.width,
                    height: image.height,
                    data: image.data,
                }),
            });
        }
        packets
    }

    async fn on_get_element_thumbnails(
        &self,
        connection: &Connection,
        version: MsexVersion,
        message: GetElementThumbnailMessage,
    ) -> Vec<CitpPacket> {
        if self
            .config
            .flags
            .contains(ServiceFlags::DISABLE_ELEMENT_THUMBNAILS)
        {
            return vec![nack(version, MsexMessageType::GetElementThumbnail.id())];
        }
        debug!(
            addr = %connection.addr,
            id = ?message.library_id,
            "element thumbnails requested"
        );

        let inventory = self.device.element_libraries();
        let Some(library) = inventory.get(&message.library_id) else {
            warn!(
                addr = %connection.addr,
                id = ?message.library_id,
                "element thumbnails requested for unknown library"
            );
            return Vec::new();
        };
        if library.library_type != message.library_type {
            warn!(
                addr = %connection.addr,
                id = ?message.library_id,
                expected = ?message.library_type,
                actual = ?library.library_type,
                "element thumbnails requested with mismatched library type"
            );
            return Vec::new();
        }

        let numbers: Vec<u8> = match message.requested_elements {
            Selection::All => library.elements.keys().copied().collect(),
            Selection::These(numbers) => numbers,
        };

        let request = ThumbnailRequest {
            width: message.width,
            height: message.height,
            format: message.format,
            preserve_aspect_ratio: message.flags.contains(ThumbnailFlags::PRESERVE_ASPECT_RATIO),
            version,
        };

        let mut packets = Vec::new();
        for number in numbers {
            let Some(element) = library.elements.get(&number) else {
                warn!(
                    addr = %connection.addr,
                    id = ?message.library_id,
                    element = number,
                    "thumbnail requested for unknown element"
                );
                continue;
            };
            let Some(image) = self
                .device
                .element_thumbnail(request, &library.information, element)
                .await
            else {
                warn!(
                    addr = %connection.addr,
                    id = ?message.library_id,
                    element = number,
                    "no thumbnail available for element"
                );
                continue;
            };
            packets.push(CitpPacket::Msex {
                version,
                message: MsexMessage::ElementThumbnail(ElementThumbnailMessage {
                    library_type: message.library_type,
                    library_id: message.library_id,
                    element_number: number,
                    format: image.format,
                    width: image.width,
                    height: image.height,
                    data: image.data,
                }),
            });
        }
        packets
    }

    fn on_get_video_sources(&self, connection: &Connection, version: MsexVersion) -> Vec<CitpPacket> {
        if self.config.flags.contains(ServiceFlags::DISABLE_STREAMING) {
            return vec![nack(version, MsexMessageType::GetVideoSources.id())];
        }
        debug!(addr = %connection.addr, "video sources requested");
        vec![CitpPacket::Msex {
            version,
            message: MsexMessage::VideoSources(VideoSourcesMessage {
                sources: self.device.video_sources(),
            }),
        }]
    }

    fn on_request_stream(
        &self,
        connection: &Connection,
        version: MsexVersion,
        message: RequestStreamMessage,
    ) -> Vec<CitpPacket> {
        if self.config.flags.contains(ServiceFlags::DISABLE_STREAMING) {
            return vec![nack(version, MsexMessageType::RequestStream.id())];
        }
        info!(
            addr = %connection.addr,
            source = message.source_identifier,
            width = message.width,
            height = message.height,
            fps = message.fps,
            timeout = message.timeout_secs,
            "stream requested"
        );

        let Some(peer) = connection.peer.as_ref() else {
            warn!(
                addr = %connection.addr,
                "cannot register stream request, no peer name announced on this connection"
            );
            return Vec::new();
        };
        self.streams.add_request(Arc::clone(peer), version, &message);
        Vec::new()
    }

    /// Builds a layer status report from the device's current state, for
    /// unsolicited delivery to interested clients.
    pub fn layer_status(&self, version: MsexVersion) -> CitpPacket {
        CitpPacket::Msex {
            version,
            message: MsexMessage::LayerStatus(citp_core::msex::LayerStatusMessage {
                layers: self.device.layer_statuses(),
            }),
        }
    }

    /// Builds a library-updated notification for broadcast to clients.
    pub fn element_library_updated(
        &self,
        version: MsexVersion,
        library_type: LibraryType,
        library_id: LibraryId,
        flags: ElementLibraryUpdatedFlags,
    ) -> CitpPacket {
        CitpPacket::Msex {
            version,
            message: MsexMessage::ElementLibraryUpdated(ElementLibraryUpdatedMessage {
                library_type,
                library_id,
                flags,
            }),
        }
    }

    /// Produces the stream frames currently due, optionally restricted to
    /// one source. The periodic timer calls the same path; this is the
    /// on-demand variant.
    pub async fn process_stream_requests(
        &self,
        source: Option<u16>,
    ) -> Vec<(Arc<Peer>, CitpPacket)> {
        self.streams
            .collect_frames(self.device.as_ref(), source)
            .await
    }

    /// Spawns the stream frame production loop on its own task.
    ///
    /// Produced frames arrive on `sink` addressed to their requesting
    /// peer; the host forwards them over its streaming transport.
    pub fn spawn_stream_timer(
        &self,
        sink: mpsc::Sender<(Arc<Peer>, CitpPacket)>,
    ) -> tokio::task::JoinHandle<()> {
        let streams = Arc::clone(&self.streams);
        let device = Arc::clone(&self.device);
        let tick = self.config.stream_tick;
        tokio::spawn(streams.run_timer(device, tick, sink))
    }
}

fn nack(version: MsexVersion, received: FourCC) -> CitpPacket {
    CitpPacket::Msex {
        version,
        message: MsexMessage::NegativeAcknowledge(NegativeAcknowledgeMessage {
            received_message_type: received,
        }),
    }
}
