//! Media server extensions layer (MSEX) messages
//!
//! MSEX covers capability negotiation, element library inventory,
//! thumbnail delivery and video streaming. Bodies follow the message-type
//! FourCC and a version byte pair; every version-dependent field here
//! branches exhaustively on [`MsexVersion`].

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::io::{CountWidth, Reader, Writer};
use crate::types::{
    read_image_buffer, write_image_buffer, ElementInformation, ElementLibraryInformation,
    ElementLibraryUpdatedFlags, ImageFormat, LayerStatus, LibraryId, LibraryType, ThumbnailFlags,
    VideoSourceInformation,
};
use crate::version::MsexVersion;

/// MSEX message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsexMessageType {
    ClientInformation,
    ServerInformation,
    NegativeAcknowledge,
    LayerStatus,
    GetElementLibraryInformation,
    ElementLibraryInformation,
    ElementLibraryUpdated,
    GetElementInformation,
    MediaElementInformation,
    EffectElementInformation,
    GenericElementInformation,
    GetElementLibraryThumbnail,
    ElementLibraryThumbnail,
    GetElementThumbnail,
    ElementThumbnail,
    GetVideoSources,
    VideoSources,
    RequestStream,
    StreamFrame,
}

impl MsexMessageType {
    pub const ALL: &'static [MsexMessageType] = &[
        MsexMessageType::ClientInformation,
        MsexMessageType::ServerInformation,
        MsexMessageType::NegativeAcknowledge,
        MsexMessageType::LayerStatus,
        MsexMessageType::GetElementLibraryInformation,
        MsexMessageType::ElementLibraryInformation,
        MsexMessageType::ElementLibraryUpdated,
        MsexMessageType::GetElementInformation,
        MsexMessageType::MediaElementInformation,
        MsexMessageType::EffectElementInformation,
        MsexMessageType::GenericElementInformation,
        MsexMessageType::GetElementLibraryThumbnail,
        MsexMessageType::ElementLibraryThumbnail,
        MsexMessageType::GetElementThumbnail,
        MsexMessageType::ElementThumbnail,
        MsexMessageType::GetVideoSources,
        MsexMessageType::VideoSources,
        MsexMessageType::RequestStream,
        MsexMessageType::StreamFrame,
    ];

    pub const fn id(self) -> FourCC {
        match self {
            MsexMessageType::ClientInformation => FourCC(*b"CInf"),
            MsexMessageType::ServerInformation => FourCC(*b"SInf"),
            MsexMessageType::NegativeAcknowledge => FourCC(*b"Nack"),
            MsexMessageType::LayerStatus => FourCC(*b"LSta"),
            MsexMessageType::GetElementLibraryInformation => FourCC(*b"GELI"),
            MsexMessageType::ElementLibraryInformation => FourCC(*b"ELIn"),
            MsexMessageType::ElementLibraryUpdated => FourCC(*b"ELUp"),
            MsexMessageType::GetElementInformation => FourCC(*b"GEIn"),
            MsexMessageType::MediaElementInformation => FourCC(*b"MEIn"),
            MsexMessageType::EffectElementInformation => FourCC(*b"EEIn"),
            MsexMessageType::GenericElementInformation => FourCC(*b"GLEI"),
            MsexMessageType::GetElementLibraryThumbnail => FourCC(*b"GELT"),
            MsexMessageType::ElementLibraryThumbnail => FourCC(*b"ELTh"),
            MsexMessageType::GetElementThumbnail => FourCC(*b"GETh"),
            MsexMessageType::ElementThumbnail => FourCC(*b"EThn"),
            MsexMessageType::GetVideoSources => FourCC(*b"GVSr"),
            MsexMessageType::VideoSources => FourCC(*b"VSrc"),
            MsexMessageType::RequestStream => FourCC(*b"RqSt"),
            MsexMessageType::StreamFrame => FourCC(*b"StFr"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"CInf" => Ok(MsexMessageType::ClientInformation),
            b"SInf" => Ok(MsexMessageType::ServerInformation),
            b"Nack" => Ok(MsexMessageType::NegativeAcknowledge),
            b"LSta" => Ok(MsexMessageType::LayerStatus),
            b"GELI" => Ok(MsexMessageType::GetElementLibraryInformation),
            b"ELIn" => Ok(MsexMessageType::ElementLibraryInformation),
            b"ELUp" => Ok(MsexMessageType::ElementLibraryUpdated),
            b"GEIn" => Ok(MsexMessageType::GetElementInformation),
            b"MEIn" => Ok(MsexMessageType::MediaElementInformation),
            b"EEIn" => Ok(MsexMessageType::EffectElementInformation),
            b"GLEI" => Ok(MsexMessageType::GenericElementInformation),
            b"GELT" => Ok(MsexMessageType::GetElementLibraryThumbnail),
            b"ELTh" => Ok(MsexMessageType::ElementLibraryThumbnail),
            b"GETh" => Ok(MsexMessageType::GetElementThumbnail),
            b"EThn" => Ok(MsexMessageType::ElementThumbnail),
            b"GVSr" => Ok(MsexMessageType::GetVideoSources),
            b"VSrc" => Ok(MsexMessageType::VideoSources),
            b"RqSt" => Ok(MsexMessageType::RequestStream),
            b"StFr" => Ok(MsexMessageType::StreamFrame),
            _ => Err(Error::UnrecognizedMessageType(id)),
        }
    }
}

/// A request for an explicit set of items, or for everything
///
/// A zero item count on the wire means "all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    These(Vec<T>),
}

fn encode_selection<T>(
    w: &mut Writer,
    width: CountWidth,
    selection: &Selection<T>,
    write: impl FnMut(&mut Writer, &T) -> Result<()>,
) -> Result<()> {
    match selection {
        Selection::All => {
            match width {
                CountWidth::One => w.u8(0),
                CountWidth::Two => w.u16(0),
            }
            Ok(())
        }
        Selection::These(items) => w.collection(width, items, write),
    }
}

fn decode_selection<T>(
    r: &mut Reader<'_>,
    width: CountWidth,
    read: impl FnMut(&mut Reader<'_>) -> Result<T>,
) -> Result<Selection<T>> {
    let items = r.collection(width, read)?;
    Ok(if items.is_empty() {
        Selection::All
    } else {
        Selection::These(items)
    })
}

/// Counts widen from one byte to two at MSEX 1.2
fn count_width(version: MsexVersion) -> CountWidth {
    match version {
        MsexVersion::V1_0 | MsexVersion::V1_1 => CountWidth::One,
        MsexVersion::V1_2 => CountWidth::Two,
    }
}

/// Declares the client's supported MSEX versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInformationMessage {
    pub supported_versions: Vec<MsexVersion>,
}

/// Describes the server and its capability sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInformationMessage {
    /// On the wire for MSEX 1.2 only
    pub uuid: String,
    pub product_name: String,
    pub product_version_major: u8,
    pub product_version_minor: u8,
    /// On the wire for MSEX 1.2 only
    pub product_version_bugfix: u8,
    /// On the wire for MSEX 1.2 only
    pub supported_versions: Vec<MsexVersion>,
    /// On the wire for MSEX 1.2 only, as a bitmask
    pub supported_library_types: Vec<LibraryType>,
    /// On the wire for MSEX 1.2 only
    pub thumbnail_formats: Vec<ImageFormat>,
    /// On the wire for MSEX 1.2 only
    pub stream_formats: Vec<ImageFormat>,
    pub layer_dmx_sources: Vec<String>,
}

/// Refuses a request that could not be serviced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeAcknowledgeMessage {
    pub received_message_type: FourCC,
}

/// Reports per-layer playback state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStatusMessage {
    pub layers: Vec<LayerStatus>,
}

/// Requests element library descriptors under a parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetElementLibraryInformationMessage {
    pub library_type: LibraryType,
    /// On the wire for MSEX 1.1+; `None` means the root
    pub parent_id: Option<LibraryId>,
    pub requested_libraries: Selection<u8>,
}

/// Lists element library descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLibraryInformationMessage {
    pub library_type: LibraryType,
    pub libraries: Vec<ElementLibraryInformation>,
}

/// Notifies clients that a library's contents changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLibraryUpdatedMessage {
    pub library_type: LibraryType,
    pub library_id: LibraryId,
    pub flags: ElementLibraryUpdatedFlags,
}

/// Requests element descriptors from one library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetElementInformationMessage {
    pub library_type: LibraryType,
    pub library_id: LibraryId,
    pub requested_elements: Selection<u8>,
}

/// Lists media element descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaElementInformationMessage {
    pub library_id: LibraryId,
    pub elements: Vec<ElementInformation>,
}

/// Lists effect element descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectElementInformationMessage {
    pub library_id: LibraryId,
    pub elements: Vec<ElementInformation>,
}

/// Lists generic element descriptors; not expressible at MSEX 1.0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericElementInformationMessage {
    pub library_type: LibraryType,
    pub library_id: LibraryId,
    pub elements: Vec<ElementInformation>,
}

/// Requests thumbnails for a set of libraries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetElementLibraryThumbnailMessage {
    pub library_type: LibraryType,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub flags: ThumbnailFlags,
    pub requested_libraries: Selection<LibraryId>,
}

/// Delivers one library thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLibraryThumbnailMessage {
    pub library_type: LibraryType,
    pub library_id: LibraryId,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

/// Requests thumbnails for elements of one library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetElementThumbnailMessage {
    pub library_type: LibraryType,
    pub library_id: LibraryId,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub flags: ThumbnailFlags,
    pub requested_elements: Selection<u8>,
}

/// Delivers one element thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementThumbnailMessage {
    pub library_type: LibraryType,
    pub library_id: LibraryId,
    pub element_number: u8,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

/// Requests the video source listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetVideoSourcesMessage;

/// Lists available video sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSourcesMessage {
    pub sources: Vec<VideoSourceInformation>,
}

/// Asks the server to stream frames from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStreamMessage {
    pub source_identifier: u16,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub fps: u8,
    /// The request expires this many seconds after receipt unless renewed
    pub timeout_secs: u8,
}

/// Carries one streamed video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrameMessage {
    /// On the wire for MSEX 1.2 only
    pub server_uuid: String,
    pub source_identifier: u16,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

/// Messages of the media server extensions layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsexMessage {
    ClientInformation(ClientInformationMessage),
    ServerInformation(ServerInformationMessage),
    NegativeAcknowledge(NegativeAcknowledgeMessage),
    LayerStatus(LayerStatusMessage),
    GetElementLibraryInformation(GetElementLibraryInformationMessage),
    ElementLibraryInformation(ElementLibraryInformationMessage),
    ElementLibraryUpdated(ElementLibraryUpdatedMessage),
    GetElementInformation(GetElementInformationMessage),
    MediaElementInformation(MediaElementInformationMessage),
    EffectElementInformation(EffectElementInformationMessage),
    GenericElementInformation(GenericElementInformationMessage),
    GetElementLibraryThumbnail(GetElementLibraryThumbnailMessage),
    ElementLibraryThumbnail(ElementLibraryThumbnailMessage),
    GetElementThumbnail(GetElementThumbnailMessage),
    ElementThumbnail(ElementThumbnailMessage),
    GetVideoSources(GetVideoSourcesMessage),
    VideoSources(VideoSourcesMessage),
    RequestStream(RequestStreamMessage),
    StreamFrame(StreamFrameMessage),
}

impl MsexMessage {
    pub fn message_type(&self) -> MsexMessageType {
        match self {
            MsexMessage::ClientInformation(_) => MsexMessageType::ClientInformation,
            MsexMessage::ServerInformation(_) => MsexMessageType::ServerInformation,
            MsexMessage::NegativeAcknowledge(_) => MsexMessageType::NegativeAcknowledge,
            MsexMessage::LayerStatus(_) => MsexMessageType::LayerStatus,
            MsexMessage::GetElementLibraryInformation(_) => {
                MsexMessageType::GetElementLibraryInformation
            }
            MsexMessage::ElementLibraryInformation(_) => MsexMessageType::ElementLibraryInformation,
            MsexMessage::ElementLibraryUpdated(_) => MsexMessageType::ElementLibraryUpdated,
            MsexMessage::GetElementInformation(_) => MsexMessageType::GetElementInformation,
            MsexMessage::MediaElementInformation(_) => MsexMessageType::MediaElementInformation,
            MsexMessage::EffectElementInformation(_) => MsexMessageType::EffectElementInformation,
            MsexMessage::GenericElementInformation(_) => MsexMessageType::GenericElementInformation,
            MsexMessage::GetElementLibraryThumbnail(_) => {
                MsexMessageType::GetElementLibraryThumbnail
            }
            MsexMessage::ElementLibraryThumbnail(_) => MsexMessageType::ElementLibraryThumbnail,
            MsexMessage::GetElementThumbnail(_) => MsexMessageType::GetElementThumbnail,
            MsexMessage::ElementThumbnail(_) => MsexMessageType::ElementThumbnail,
            MsexMessage::GetVideoSources(_) => MsexMessageType::GetVideoSources,
            MsexMessage::VideoSources(_) => MsexMessageType::VideoSources,
            MsexMessage::RequestStream(_) => MsexMessageType::RequestStream,
            MsexMessage::StreamFrame(_) => MsexMessageType::StreamFrame,
        }
    }

    /// Decodes the body following an already-read preamble.
    pub fn decode(
        message_type: MsexMessageType,
        version: MsexVersion,
        r: &mut Reader<'_>,
    ) -> Result<Self> {
        match message_type {
            MsexMessageType::ClientInformation => {
                Ok(MsexMessage::ClientInformation(decode_client_information(r)?))
            }
            MsexMessageType::ServerInformation => Ok(MsexMessage::ServerInformation(
                decode_server_information(version, r)?,
            )),
            MsexMessageType::NegativeAcknowledge => {
                Ok(MsexMessage::NegativeAcknowledge(NegativeAcknowledgeMessage {
                    received_message_type: r.fourcc()?,
                }))
            }
            MsexMessageType::LayerStatus => Ok(MsexMessage::LayerStatus(LayerStatusMessage {
                layers: r.collection(CountWidth::One, |r| LayerStatus::decode(r, version))?,
            })),
            MsexMessageType::GetElementLibraryInformation => Ok(
                MsexMessage::GetElementLibraryInformation(decode_get_library_information(
                    version, r,
                )?),
            ),
            MsexMessageType::ElementLibraryInformation => {
                Ok(MsexMessage::ElementLibraryInformation(
                    decode_library_information(version, r)?,
                ))
            }
            MsexMessageType::ElementLibraryUpdated => {
                Ok(MsexMessage::ElementLibraryUpdated(ElementLibraryUpdatedMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    library_id: LibraryId::decode(r, version)?,
                    flags: ElementLibraryUpdatedFlags(r.u8()?),
                }))
            }
            MsexMessageType::GetElementInformation => {
                Ok(MsexMessage::GetElementInformation(GetElementInformationMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    library_id: LibraryId::decode(r, version)?,
                    requested_elements: decode_selection(r, count_width(version), |r| r.u8())?,
                }))
            }
            MsexMessageType::MediaElementInformation => {
                Ok(MsexMessage::MediaElementInformation(MediaElementInformationMessage {
                    library_id: LibraryId::decode(r, version)?,
                    elements: r.collection(count_width(version), |r| {
                        ElementInformation::decode_media(r, version)
                    })?,
                }))
            }
            MsexMessageType::EffectElementInformation => {
                Ok(MsexMessage::EffectElementInformation(EffectElementInformationMessage {
                    library_id: LibraryId::decode(r, version)?,
                    elements: r.collection(count_width(version), |r| {
                        ElementInformation::decode_effect(r, version)
                    })?,
                }))
            }
            MsexMessageType::GenericElementInformation => {
                reject_at_v1_0(version)?;
                Ok(MsexMessage::GenericElementInformation(GenericElementInformationMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    library_id: LibraryId::decode(r, version)?,
                    elements: r.collection(count_width(version), |r| {
                        ElementInformation::decode_generic(r, version)
                    })?,
                }))
            }
            MsexMessageType::GetElementLibraryThumbnail => {
                Ok(MsexMessage::GetElementLibraryThumbnail(GetElementLibraryThumbnailMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    format: ImageFormat::from_id(r.fourcc()?)?,
                    width: r.u16()?,
                    height: r.u16()?,
                    flags: ThumbnailFlags(r.u8()?),
                    requested_libraries: decode_selection(r, count_width(version), |r| {
                        LibraryId::decode(r, version)
                    })?,
                }))
            }
            MsexMessageType::ElementLibraryThumbnail => {
                Ok(MsexMessage::ElementLibraryThumbnail(ElementLibraryThumbnailMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    library_id: LibraryId::decode(r, version)?,
                    format: ImageFormat::from_id(r.fourcc()?)?,
                    width: r.u16()?,
                    height: r.u16()?,
                    data: read_image_buffer(r)?,
                }))
            }
            MsexMessageType::GetElementThumbnail => {
                Ok(MsexMessage::GetElementThumbnail(GetElementThumbnailMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    library_id: LibraryId::decode(r, version)?,
                    format: ImageFormat::from_id(r.fourcc()?)?,
                    width: r.u16()?,
                    height: r.u16()?,
                    flags: ThumbnailFlags(r.u8()?),
                    requested_elements: decode_selection(r, count_width(version), |r| r.u8())?,
                }))
            }
            MsexMessageType::ElementThumbnail => {
                Ok(MsexMessage::ElementThumbnail(ElementThumbnailMessage {
                    library_type: LibraryType::from_u8(r.u8()?)?,
                    library_id: LibraryId::decode(r, version)?,
                    element_number: r.u8()?,
                    format: ImageFormat::from_id(r.fourcc()?)?,
                    width: r.u16()?,
                    height: r.u16()?,
                    data: read_image_buffer(r)?,
                }))
            }
            MsexMessageType::GetVideoSources => {
                Ok(MsexMessage::GetVideoSources(GetVideoSourcesMessage))
            }
            MsexMessageType::VideoSources => Ok(MsexMessage::VideoSources(VideoSourcesMessage {
                sources: r.collection(CountWidth::Two, VideoSourceInformation::decode)?,
            })),
            MsexMessageType::RequestStream => {
                Ok(MsexMessage::RequestStream(RequestStreamMessage {
                    source_identifier: r.u16()?,
                    format: ImageFormat::from_id(r.fourcc()?)?,
                    width: r.u16()?,
                    height: r.u16()?,
                    fps: r.u8()?,
                    timeout_secs: r.u8()?,
                }))
            }
            MsexMessageType::StreamFrame => {
                let server_uuid = if version == MsexVersion::V1_2 {
                    r.string()?
                } else {
                    String::new()
                };
                Ok(MsexMessage::StreamFrame(StreamFrameMessage {
                    server_uuid,
                    source_identifier: r.u16()?,
                    format: ImageFormat::from_id(r.fourcc()?)?,
                    width: r.u16()?,
                    height: r.u16()?,
                    data: read_image_buffer(r)?,
                }))
            }
        }
    }

    /// Encodes the body fields; message type and version bytes are written
    /// by the packet layer.
    pub fn encode(&self, version: MsexVersion, w: &mut Writer) -> Result<()> {
        match self {
            MsexMessage::ClientInformation(m) => encode_client_information(w, m),
            MsexMessage::ServerInformation(m) => encode_server_information(w, version, m),
            MsexMessage::NegativeAcknowledge(m) => {
                w.fourcc(m.received_message_type);
                Ok(())
            }
            MsexMessage::LayerStatus(m) => {
                w.collection(CountWidth::One, &m.layers, |w, layer| layer.encode(w, version))
            }
            MsexMessage::GetElementLibraryInformation(m) => {
                w.u8(m.library_type as u8);
                if version >= MsexVersion::V1_1 {
                    m.parent_id.unwrap_or(LibraryId::ROOT).encode(w, version)?;
                }
                encode_selection(w, count_width(version), &m.requested_libraries, |w, n| {
                    w.u8(*n);
                    Ok(())
                })
            }
            MsexMessage::ElementLibraryInformation(m) => {
                w.u8(m.library_type as u8);
                w.collection(count_width(version), &m.libraries, |w, library| {
                    library.encode(w, version)
                })
            }
            MsexMessage::ElementLibraryUpdated(m) => {
                w.u8(m.library_type as u8);
                m.library_id.encode(w, version)?;
                w.u8(m.flags.0);
                Ok(())
            }
            MsexMessage::GetElementInformation(m) => {
                w.u8(m.library_type as u8);
                m.library_id.encode(w, version)?;
                encode_selection(w, count_width(version), &m.requested_elements, |w, n| {
                    w.u8(*n);
                    Ok(())
                })
            }
            MsexMessage::MediaElementInformation(m) => {
                m.library_id.encode(w, version)?;
                w.collection(count_width(version), &m.elements, |w, element| {
                    element.encode(w, version)
                })
            }
            MsexMessage::EffectElementInformation(m) => {
                m.library_id.encode(w, version)?;
                w.collection(count_width(version), &m.elements, |w, element| {
                    element.encode(w, version)
                })
            }
            MsexMessage::GenericElementInformation(m) => {
                reject_at_v1_0(version)?;
                w.u8(m.library_type as u8);
                m.library_id.encode(w, version)?;
                w.collection(count_width(version), &m.elements, |w, element| {
                    element.encode(w, version)
                })
            }
            MsexMessage::GetElementLibraryThumbnail(m) => {
                w.u8(m.library_type as u8);
                w.fourcc(m.format.id());
                w.u16(m.width);
                w.u16(m.height);
                w.u8(m.flags.0);
                encode_selection(w, count_width(version), &m.requested_libraries, |w, id| {
                    id.encode(w, version)
                })
            }
            MsexMessage::ElementLibraryThumbnail(m) => {
                w.u8(m.library_type as u8);
                m.library_id.encode(w, version)?;
                w.fourcc(m.format.id());
                w.u16(m.width);
                w.u16(m.height);
                write_image_buffer(w, &m.data)
            }
            MsexMessage::GetElementThumbnail(m) => {
                w.u8(m.library_type as u8);
                m.library_id.encode(w, version)?;
                w.fourcc(m.format.id());
                w.u16(m.width);
                w.u16(m.height);
                w.u8(m.flags.0);
                encode_selection(w, count_width(version), &m.requested_elements, |w, n| {
                    w.u8(*n);
                    Ok(())
                })
            }
            MsexMessage::ElementThumbnail(m) => {
                w.u8(m.library_type as u8);
                m.library_id.encode(w, version)?;
                w.u8(m.element_number);
                w.fourcc(m.format.id());
                w.u16(m.width);
                w.u16(m.height);
                write_image_buffer(w, &m.data)
            }
            MsexMessage::GetVideoSources(_) => Ok(()),
            MsexMessage::VideoSources(m) => {
                w.collection(CountWidth::Two, &m.sources, |w, source| source.encode(w))
            }
            MsexMessage::RequestStream(m) => {
                w.u16(m.source_identifier);
                w.fourcc(m.format.id());
                w.u16(m.width);
                w.u16(m.height);
                w.u8(m.fps);
                w.u8(m.timeout_secs);
                Ok(())
            }
            MsexMessage::StreamFrame(m) => {
                if version == MsexVersion::V1_2 {
                    w.string(&m.server_uuid)?;
                }
                w.u16(m.source_identifier);
                w.fourcc(m.format.id());
                w.u16(m.width);
                w.u16(m.height);
                write_image_buffer(w, &m.data)
            }
        }
    }
}

fn reject_at_v1_0(version: MsexVersion) -> Result<()> {
    if version == MsexVersion::V1_0 {
        return Err(Error::UnsupportedVersion { major: 1, minor: 0 });
    }
    Ok(())
}

fn encode_client_information(w: &mut Writer, m: &ClientInformationMessage) -> Result<()> {
    w.collection(CountWidth::One, &m.supported_versions, |w, version| {
        let (major, minor) = version.to_pair();
        w.u8(major);
        w.u8(minor);
        Ok(())
    })
}

fn decode_client_information(r: &mut Reader<'_>) -> Result<ClientInformationMessage> {
    let pairs = r.collection(CountWidth::One, |r| {
        let major = r.u8()?;
        let minor = r.u8()?;
        Ok((major, minor))
    })?;
    // versions this implementation does not speak are dropped rather than
    // failing the handshake
    let supported_versions = pairs
        .into_iter()
        .filter_map(|(major, minor)| MsexVersion::from_pair(major, minor).ok())
        .collect();
    Ok(ClientInformationMessage { supported_versions })
}

fn encode_server_information(
    w: &mut Writer,
    version: MsexVersion,
    m: &ServerInformationMessage,
) -> Result<()> {
    match version {
        MsexVersion::V1_0 | MsexVersion::V1_1 => {
            w.string(&m.product_name)?;
            w.u8(m.product_version_major);
            w.u8(m.product_version_minor);
            w.collection(CountWidth::One, &m.layer_dmx_sources, |w, source| {
                w.string(source)
            })
        }
        MsexVersion::V1_2 => {
            w.string(&m.uuid)?;
            w.string(&m.product_name)?;
            w.u8(m.product_version_major);
            w.u8(m.product_version_minor);
            w.u8(m.product_version_bugfix);
            w.collection(CountWidth::One, &m.supported_versions, |w, v| {
                let (major, minor) = v.to_pair();
                w.u8(major);
                w.u8(minor);
                Ok(())
            })?;
            w.u16(LibraryType::mask(&m.supported_library_types));
            w.collection(CountWidth::One, &m.thumbnail_formats, |w, format| {
                w.fourcc(format.id());
                Ok(())
            })?;
            w.collection(CountWidth::One, &m.stream_formats, |w, format| {
                w.fourcc(format.id());
                Ok(())
            })?;
            w.collection(CountWidth::One, &m.layer_dmx_sources, |w, source| {
                w.string(source)
            })
        }
    }
}

fn decode_server_information(
    version: MsexVersion,
    r: &mut Reader<'_>,
) -> Result<ServerInformationMessage> {
    match version {
        MsexVersion::V1_0 | MsexVersion::V1_1 => {
            let product_name = r.string()?;
            let product_version_major = r.u8()?;
            let product_version_minor = r.u8()?;
            let layer_dmx_sources = r.collection(CountWidth::One, |r| r.string())?;
            Ok(ServerInformationMessage {
                uuid: String::new(),
                product_name,
                product_version_major,
                product_version_minor,
                product_version_bugfix: 0,
                supported_versions: Vec::new(),
                supported_library_types: Vec::new(),
                thumbnail_formats: Vec::new(),
                stream_formats: Vec::new(),
                layer_dmx_sources,
            })
        }
        MsexVersion::V1_2 => {
            let uuid = r.string()?;
            let product_name = r.string()?;
            let product_version_major = r.u8()?;
            let product_version_minor = r.u8()?;
            let product_version_bugfix = r.u8()?;
            let supported_versions = r
                .collection(CountWidth::One, |r| {
                    let major = r.u8()?;
                    let minor = r.u8()?;
                    Ok((major, minor))
                })?
                .into_iter()
                .filter_map(|(major, minor)| MsexVersion::from_pair(major, minor).ok())
                .collect();
            let supported_library_types = LibraryType::from_mask(r.u16()?);
            let thumbnail_formats =
                r.collection(CountWidth::One, |r| ImageFormat::from_id(r.fourcc()?))?;
            let stream_formats =
                r.collection(CountWidth::One, |r| ImageFormat::from_id(r.fourcc()?))?;
            let layer_dmx_sources = r.collection(CountWidth::One, |r| r.string())?;
            Ok(ServerInformationMessage {
                uuid,
                product_name,
                product_version_major,
                product_version_minor,
                product_version_bugfix,
                supported_versions,
                supported_library_types,
                thumbnail_formats,
                stream_formats,
                layer_dmx_sources,
            })
        }
    }
}

fn decode_get_library_information(
    version: MsexVersion,
    r: &mut Reader<'_>,
) -> Result<GetElementLibraryInformationMessage> {
    let library_type = LibraryType::from_u8(r.u8()?)?;
    let parent_id = if version >= MsexVersion::V1_1 {
        Some(LibraryId::decode(r, version)?)
    } else {
        None
    };
    let requested_libraries = decode_selection(r, count_width(version), |r| r.u8())?;
    Ok(GetElementLibraryInformationMessage {
        library_type,
        parent_id,
        requested_libraries,
    })
}

fn decode_library_information(
    version: MsexVersion,
    r: &mut Reader<'_>,
) -> Result<ElementLibraryInformationMessage> {
    let library_type = LibraryType::from_u8(r.u8()?)?;
    let libraries = r.collection(count_width(version), |r| {
        ElementLibraryInformation::decode(r, version)
    })?;
    Ok(ElementLibraryInformationMessage {
        library_type,
        libraries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_bijection() {
        for &m in MsexMessageType::ALL {
            assert_eq!(MsexMessageType::from_id(m.id()).unwrap(), m);
        }
    }

    #[test]
    fn test_unknown_message_type() {
        let err = MsexMessageType::from_id(FourCC(*b"Zzzz")).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedMessageType(_)));
    }

    #[test]
    fn test_client_information_skips_unknown_versions() {
        let mut w = Writer::new();
        w.u8(3);
        w.u8(1);
        w.u8(0);
        w.u8(1);
        w.u8(7); // future minor version
        w.u8(1);
        w.u8(2);
        let buf = w.finish();

        let mut r = Reader::new(&buf);
        let m = decode_client_information(&mut r).unwrap();
        assert_eq!(m.supported_versions, vec![MsexVersion::V1_0, MsexVersion::V1_2]);
    }

    #[test]
    fn test_generic_listing_rejected_at_v1_0() {
        let message = MsexMessage::GenericElementInformation(GenericElementInformationMessage {
            library_type: LibraryType::Cues,
            library_id: LibraryId::ROOT.child(1).unwrap(),
            elements: vec![],
        });
        let mut w = Writer::new();
        assert!(matches!(
            message.encode(MsexVersion::V1_0, &mut w),
            Err(Error::UnsupportedVersion { major: 1, minor: 0 })
        ));
    }
}
