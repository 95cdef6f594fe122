//! Packet registry
//!
//! Maps (layer, message type) identifiers onto concrete packet variants.
//! The mapping is closed and exhaustive: supporting a new message means
//! adding a variant, never a runtime default.

use bytes::Bytes;

use crate::envelope::{self, Header};
use crate::error::{Error, Result};
use crate::fourcc::{FourCC, LayerType};
use crate::io::{Reader, Writer};
use crate::msex::{MsexMessage, MsexMessageType};
use crate::pinf::{PinfMessage, PinfMessageType};
use crate::version::MsexVersion;

/// MSEX body preamble: the message type plus the version the body is
/// encoded at.
#[derive(Debug, Clone, Copy)]
pub struct MsexPreamble {
    pub message_type: FourCC,
    pub version: MsexVersion,
}

/// Splits an MSEX body into its preamble and payload.
///
/// Kept separate from [`CitpPacket::decode_body`] so a server can still
/// negative-acknowledge a message whose type it does not recognise: the
/// preamble parses even when the type does not.
pub fn split_msex_body(body: &[u8]) -> Result<(MsexPreamble, &[u8])> {
    let mut r = Reader::new(body);
    let message_type = r.fourcc()?;
    let major = r.u8()?;
    let minor = r.u8()?;
    let version = MsexVersion::from_pair(major, minor)?;
    Ok((
        MsexPreamble {
            message_type,
            version,
        },
        &body[6..],
    ))
}

/// A decoded CITP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitpPacket {
    Pinf(PinfMessage),
    Msex {
        version: MsexVersion,
        message: MsexMessage,
    },
}

impl CitpPacket {
    pub fn layer(&self) -> LayerType {
        match self {
            CitpPacket::Pinf(_) => LayerType::PeerInformation,
            CitpPacket::Msex { .. } => LayerType::MediaServerExtensions,
        }
    }

    /// Decodes a reassembled body for `layer`.
    pub fn decode_body(layer: LayerType, body: &[u8]) -> Result<Self> {
        match layer {
            LayerType::PeerInformation => {
                let mut r = Reader::new(body);
                let message_type = PinfMessageType::from_id(r.fourcc()?)?;
                Ok(CitpPacket::Pinf(PinfMessage::decode(message_type, &mut r)?))
            }
            LayerType::MediaServerExtensions => {
                let (preamble, payload) = split_msex_body(body)?;
                let message_type = MsexMessageType::from_id(preamble.message_type)?;
                let mut r = Reader::new(payload);
                Ok(CitpPacket::Msex {
                    version: preamble.version,
                    message: MsexMessage::decode(message_type, preamble.version, &mut r)?,
                })
            }
            other => Err(Error::UnrecognizedContentType(other.id())),
        }
    }

    /// Decodes one single-part datagram: envelope header plus body.
    pub fn decode_datagram(data: &[u8]) -> Result<(Header, Self)> {
        let (header, body) = Header::decode(data)?;
        let packet = Self::decode_body(header.layer, body)?;
        Ok((header, packet))
    }

    /// Serializes the body: message type, version bytes where the layer
    /// carries them, then the payload fields.
    pub fn encode_body(&self) -> Result<Bytes> {
        let mut w = Writer::new();
        match self {
            CitpPacket::Pinf(message) => {
                w.fourcc(message.message_type().id());
                message.encode(&mut w)?;
            }
            CitpPacket::Msex { version, message } => {
                w.fourcc(message.message_type().id());
                let (major, minor) = version.to_pair();
                w.u8(major);
                w.u8(minor);
                message.encode(*version, &mut w)?;
            }
        }
        Ok(w.finish())
    }

    /// Frames the packet into datagrams ready to send.
    pub fn to_datagrams(
        &self,
        request_index: u16,
        max_packet_size: Option<usize>,
    ) -> Result<Vec<Bytes>> {
        let body = self.encode_body()?;
        envelope::encode_datagrams(self.layer(), request_index, &body, max_packet_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinf::PeerNameMessage;

    #[test]
    fn test_datagram_roundtrip() {
        let packet = CitpPacket::Pinf(PinfMessage::PeerName(PeerNameMessage {
            name: "Console 1".into(),
        }));
        let datagrams = packet.to_datagrams(42, None).unwrap();
        assert_eq!(datagrams.len(), 1);

        let (header, decoded) = CitpPacket::decode_datagram(&datagrams[0]).unwrap();
        assert_eq!(header.request_index, 42);
        assert_eq!(header.layer, LayerType::PeerInformation);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_declared_layer_has_no_registry_entry() {
        let err = CitpPacket::decode_body(LayerType::SendDmx, b"Capa").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedContentType(_)));
    }

    #[test]
    fn test_minimum_packet_size() {
        let packet = CitpPacket::Pinf(PinfMessage::PeerName(PeerNameMessage {
            name: String::new(),
        }));
        let datagrams = packet.to_datagrams(0, None).unwrap();
        assert!(datagrams[0].len() >= crate::MIN_PACKET_SIZE);
    }
}
