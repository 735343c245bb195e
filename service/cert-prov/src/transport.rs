// Licensed under the Apache-2.0 license

use core::fmt::{Display, Formatter};

// The service does not own a network stack. It is handed an ExchangeManager
// to register for unsolicited requests, and each request arrives together
// with an ExchangeContext through which exactly one reply is sent.
//
//     Client                               Service
//        |   GetCertificateRequest            |
//        | ---------------------------------> |  ExchangeManager dispatch
//        |   GetCertificateResponse           |
//        | <--------------------------------- |  ExchangeContext::send_message
//        |        or StatusReport             |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    AlreadyRegistered,
    Closed,
    SendFailed,
}

/// Message delivered to the service by the exchange layer.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub profile_id: u32,
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(profile_id: u32, msg_type: u8, payload: Vec<u8>) -> Self {
        Self {
            profile_id,
            msg_type,
            payload,
        }
    }
}

impl Display for InboundMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "InboundMessage {{ profile: {:#010x}, type: {}, len: {} }}",
            self.profile_id,
            self.msg_type,
            self.payload.len()
        )
    }
}

pub trait ExchangeManager {
    /// Routes unsolicited messages of the given profile and type to this endpoint.
    ///
    /// # Returns
    ///
    /// * `Result<(), TransportError>` - `AlreadyRegistered` if another handler
    ///   owns the pair.
    fn register_unsolicited_handler(
        &mut self,
        profile_id: u32,
        msg_type: u8,
    ) -> Result<(), TransportError>;

    /// Removes a registration made with `register_unsolicited_handler`.
    ///
    /// This method does not return a result and is expected to always succeed.
    fn unregister_unsolicited_handler(&mut self, profile_id: u32, msg_type: u8);
}

pub trait ExchangeContext {
    /// Node id of the peer that opened the exchange.
    fn peer_node_id(&self) -> u64;

    /// Sends a message on the exchange.
    ///
    /// # Arguments
    ///
    /// * `profile_id` - Profile of the outgoing message.
    /// * `msg_type` - Message type within the profile.
    /// * `payload` - Encoded message body.
    fn send_message(
        &mut self,
        profile_id: u32,
        msg_type: u8,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}
