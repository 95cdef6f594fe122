//! Peer information layer (PINF) messages
//!
//! PINF carries peer identity announcements: the name message over every
//! transport, the location message over the discovery multicast.

use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::io::{Reader, Writer};

/// PINF message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinfMessageType {
    PeerName,
    PeerLocation,
}

impl PinfMessageType {
    pub const ALL: &'static [PinfMessageType] =
        &[PinfMessageType::PeerName, PinfMessageType::PeerLocation];

    pub const fn id(self) -> FourCC {
        match self {
            PinfMessageType::PeerName => FourCC(*b"PNam"),
            PinfMessageType::PeerLocation => FourCC(*b"PLoc"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"PNam" => Ok(PinfMessageType::PeerName),
            b"PLoc" => Ok(PinfMessageType::PeerLocation),
            _ => Err(Error::UnrecognizedMessageType(id)),
        }
    }
}

/// Announces the sender's display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNameMessage {
    pub name: String,
}

/// Announces how and where a peer can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLocationMessage {
    pub listening_tcp_port: u16,
    /// Peer category, e.g. "MediaServer" or "LightingConsole"
    pub kind: String,
    pub name: String,
    /// Free-form state description shown on consoles
    pub state: String,
}

/// Messages of the peer information layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinfMessage {
    PeerName(PeerNameMessage),
    PeerLocation(PeerLocationMessage),
}

impl PinfMessage {
    pub fn message_type(&self) -> PinfMessageType {
        match self {
            PinfMessage::PeerName(_) => PinfMessageType::PeerName,
            PinfMessage::PeerLocation(_) => PinfMessageType::PeerLocation,
        }
    }

    /// Decodes the body following an already-read message type.
    pub fn decode(message_type: PinfMessageType, r: &mut Reader<'_>) -> Result<Self> {
        match message_type {
            PinfMessageType::PeerName => Ok(PinfMessage::PeerName(PeerNameMessage {
                name: r.string()?,
            })),
            PinfMessageType::PeerLocation => Ok(PinfMessage::PeerLocation(PeerLocationMessage {
                listening_tcp_port: r.u16()?,
                kind: r.string()?,
                name: r.string()?,
                state: r.string()?,
            })),
        }
    }

    /// Encodes the body fields; the message type FourCC is written by the
    /// packet layer.
    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        match self {
            PinfMessage::PeerName(m) => w.string(&m.name),
            PinfMessage::PeerLocation(m) => {
                w.u16(m.listening_tcp_port);
                w.string(&m.kind)?;
                w.string(&m.name)?;
                w.string(&m.state)
            }
        }
    }
}
