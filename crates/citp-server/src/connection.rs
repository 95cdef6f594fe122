//! Per-connection protocol state

use std::net::SocketAddr;
use std::sync::Arc;

use citp_core::envelope::Reassembler;
use citp_core::MsexVersion;

use crate::peers::Peer;

/// Dispatch state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing negotiated yet; MSEX traffic other than client
    /// information is refused
    #[default]
    AwaitingClientInfo,
    /// Client information received; full dispatch available
    Active,
}

/// Protocol-side view of one transport connection
///
/// Owned by whichever task services the connection; dropping it cancels
/// all further dispatch and discards any partial reassembly state.
#[derive(Debug)]
pub struct Connection {
    pub addr: SocketAddr,
    pub state: ConnectionState,
    /// Identity resolved from the peer name announcement, if any
    pub peer: Option<Arc<Peer>>,
    /// Versions the client declared in its client information message
    pub supported_versions: Vec<MsexVersion>,
    pub(crate) reassembler: Reassembler,
}

impl Connection {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: ConnectionState::default(),
            peer: None,
            supported_versions: Vec::new(),
            reassembler: Reassembler::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == ConnectionState::Active
    }
}
