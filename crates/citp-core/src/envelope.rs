//! CITP packet envelope
//!
//! Every CITP exchange travels in datagrams opening with a fixed 20-byte
//! header:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Bytes 0-3:   Cookie "CITP"                               │
//! │ Byte  4:     Version major (1)                           │
//! │ Byte  5:     Version minor (0)                           │
//! │ Bytes 6-7:   Request/response index (uint16 LE)          │
//! │ Bytes 8-11:  Total packet length (uint32 LE, this part)  │
//! │ Bytes 12-13: Message part count (uint16 LE)              │
//! │ Bytes 14-15: Message part index (uint16 LE)              │
//! │ Bytes 16-19: Layer identifier (FourCC)                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Bodies larger than a caller-supplied maximum are split across parts
//! sharing a request/response index; [`Reassembler`] rebuilds them on the
//! receiving side. The protocol itself prescribes no reassembly timeout,
//! so [`Reassembler::prune`] bounds partial state by idle time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::fourcc::{FourCC, LayerType};
use crate::{COOKIE, HEADER_SIZE, VERSION_MAJOR, VERSION_MINOR};

/// Decoded CITP packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub request_index: u16,
    /// Length of this part, header included
    pub total_length: u32,
    pub part_count: u16,
    pub part_index: u16,
    pub layer: LayerType,
}

impl Header {
    /// Decodes the header, returning it together with the body slice.
    ///
    /// A wrong cookie or wire version means the sender is not speaking
    /// CITP 1.0; callers should treat that as fatal for the connection.
    pub fn decode(data: &[u8]) -> Result<(Header, &[u8])> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedData {
                needed: HEADER_SIZE,
                have: data.len(),
            });
        }
        if data[0..4] != COOKIE {
            return Err(Error::InvalidCookie(FourCC([
                data[0], data[1], data[2], data[3],
            ])));
        }
        let (major, minor) = (data[4], data[5]);
        if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
            return Err(Error::UnsupportedVersion { major, minor });
        }
        let request_index = u16::from_le_bytes([data[6], data[7]]);
        let total_length = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let part_count = u16::from_le_bytes([data[12], data[13]]);
        let part_index = u16::from_le_bytes([data[14], data[15]]);
        let layer = LayerType::from_id(FourCC([data[16], data[17], data[18], data[19]]))?;

        let total = total_length as usize;
        if total < HEADER_SIZE || data.len() < total {
            return Err(Error::TruncatedData {
                needed: total.max(HEADER_SIZE),
                have: data.len(),
            });
        }

        Ok((
            Header {
                request_index,
                total_length,
                part_count,
                part_index,
                layer,
            },
            &data[HEADER_SIZE..total],
        ))
    }

    /// Returns the size of the first complete packet in `buf`, if any.
    ///
    /// Byte-stream transports use this to delimit packets.
    pub fn check_complete(buf: &[u8]) -> Option<usize> {
        if buf.len() < HEADER_SIZE || buf[0..4] != COOKIE {
            return None;
        }
        let total = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
        (total >= HEADER_SIZE && buf.len() >= total).then_some(total)
    }
}

fn write_header(
    buf: &mut BytesMut,
    layer: LayerType,
    request_index: u16,
    total_length: u32,
    part_count: u16,
    part_index: u16,
) {
    buf.put_slice(&COOKIE);
    buf.put_u8(VERSION_MAJOR);
    buf.put_u8(VERSION_MINOR);
    buf.put_u16_le(request_index);
    buf.put_u32_le(total_length);
    buf.put_u16_le(part_count);
    buf.put_u16_le(part_index);
    buf.put_slice(&layer.id().0);
}

/// Frames `body` into a single part-0-of-1 datagram.
pub fn encode_single(layer: LayerType, request_index: u16, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    write_header(
        &mut buf,
        layer,
        request_index,
        (HEADER_SIZE + body.len()) as u32,
        1,
        0,
    );
    buf.put_slice(body);
    buf.freeze()
}

/// Frames `body` into one or more datagrams.
///
/// With a size limit the body is split into `ceil(len / (max - 20))`
/// parts sharing `request_index`, part indices ascending from 0.
/// Without one, a single packet is produced.
pub fn encode_datagrams(
    layer: LayerType,
    request_index: u16,
    body: &[u8],
    max_packet_size: Option<usize>,
) -> Result<Vec<Bytes>> {
    let Some(max) = max_packet_size else {
        return Ok(vec![encode_single(layer, request_index, body)]);
    };
    if max <= HEADER_SIZE {
        return Err(Error::FragmentLimit(max));
    }

    let chunk = max - HEADER_SIZE;
    let count = body.len().div_ceil(chunk).max(1);
    if count > u16::MAX as usize {
        return Err(Error::PayloadTooLarge(body.len()));
    }

    let mut parts = Vec::with_capacity(count);
    for index in 0..count {
        let start = index * chunk;
        let piece = &body[start..body.len().min(start + chunk)];
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + piece.len());
        write_header(
            &mut buf,
            layer,
            request_index,
            (HEADER_SIZE + piece.len()) as u32,
            count as u16,
            index as u16,
        );
        buf.put_slice(piece);
        parts.push(buf.freeze());
    }
    Ok(parts)
}

/// Rebuilds fragmented message bodies.
///
/// Parts are keyed by request/response index and concatenated in part
/// order once all have arrived. Callers must invoke [`Reassembler::prune`]
/// periodically (or per datagram) so an abandoned transfer cannot hold
/// memory forever.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: HashMap<u16, Pending>,
}

#[derive(Debug)]
struct Pending {
    parts: Vec<Option<Bytes>>,
    received: usize,
    last_activity: Instant,
}

impl Pending {
    fn empty(part_count: u16) -> Self {
        Pending {
            parts: vec![None; part_count as usize],
            received: 0,
            last_activity: Instant::now(),
        }
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one decoded part; returns the full body once every part of
    /// the message has arrived.
    ///
    /// Single-part messages pass straight through. A duplicate part is
    /// overwritten; a part count that disagrees with earlier parts for the
    /// same request index restarts that slot with the newer framing.
    pub fn push(&mut self, header: &Header, body: &[u8]) -> Result<Option<Bytes>> {
        if header.part_count <= 1 {
            return Ok(Some(Bytes::copy_from_slice(body)));
        }
        if header.part_index >= header.part_count {
            return Err(Error::PartIndexOutOfRange {
                index: header.part_index,
                count: header.part_count,
            });
        }

        let pending = self
            .pending
            .entry(header.request_index)
            .or_insert_with(|| Pending::empty(header.part_count));
        if pending.parts.len() != header.part_count as usize {
            *pending = Pending::empty(header.part_count);
        }

        let slot = &mut pending.parts[header.part_index as usize];
        if slot.is_none() {
            pending.received += 1;
        }
        *slot = Some(Bytes::copy_from_slice(body));
        pending.last_activity = Instant::now();

        if pending.received < pending.parts.len() {
            return Ok(None);
        }

        let Some(done) = self.pending.remove(&header.request_index) else {
            return Ok(None);
        };
        let mut full = BytesMut::new();
        for part in done.parts.into_iter().flatten() {
            full.put_slice(&part);
        }
        Ok(Some(full.freeze()))
    }

    /// Drops partial messages idle longer than `ttl`.
    pub fn prune(&mut self, ttl: Duration) {
        self.pending.retain(|_, p| p.last_activity.elapsed() < ttl);
    }

    /// Number of incomplete messages currently buffered
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
