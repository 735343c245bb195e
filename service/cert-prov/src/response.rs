// Licensed under the Apache-2.0 license

use weave_tlv::{context_tag, Tag, TlvError, TlvResult, TlvType, TlvWriter};
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::protocol::response_tags::{OP_DEVICE_CERT, RELATED_CERTS};
use crate::protocol::{
    StatusCode, COMMON_PROFILE, MAX_MESSAGE_SIZE, MSG_TYPE_GET_CERTIFICATE_RESPONSE,
    MSG_TYPE_STATUS_REPORT, SECURITY_PROFILE,
};

/// Writes a GetCertificateResponse holding the issued certificate and,
/// optionally, one related certificate.
///
/// # Arguments
///
/// * `buf` - Destination buffer.
/// * `cert` - Encoded issued certificate. Its own tag is replaced.
/// * `related` - Encoded certificate the peer needs to build the chain.
///
/// # Returns
///
/// The number of bytes written.
pub fn encode_certificate_response(
    buf: &mut [u8],
    cert: &[u8],
    related: Option<&[u8]>,
) -> TlvResult<usize> {
    let mut writer = TlvWriter::new(buf);
    writer.start_container(Tag::Anonymous, TlvType::Structure)?;
    writer.copy_container(context_tag(OP_DEVICE_CERT), cert)?;
    if let Some(related) = related {
        writer.start_container(context_tag(RELATED_CERTS), TlvType::Array)?;
        writer.copy_container(Tag::Anonymous, related)?;
        writer.end_container()?;
    }
    writer.end_container()?;
    writer.finalize()
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct StatusReport {
    profile_id: U32<LittleEndian>,
    status_code: U16<LittleEndian>,
}

impl StatusReport {
    pub fn new(profile_id: u32, status_code: StatusCode) -> Self {
        Self {
            profile_id: U32::new(profile_id),
            status_code: U16::new(status_code.into()),
        }
    }

    pub fn profile_id(&self) -> u32 {
        self.profile_id.get()
    }

    pub fn status_code(&self) -> u16 {
        self.status_code.get()
    }

    pub fn encode(&self, buf: &mut [u8]) -> TlvResult<usize> {
        self.write_to_prefix(buf)
            .map_err(|_| TlvError::BufferTooSmall)
            .map(|_| core::mem::size_of::<Self>())
    }

    pub fn decode(buf: &[u8]) -> TlvResult<Self> {
        Ok(Self::read_from_prefix(buf)
            .map_err(|_| TlvError::UnderRun)?
            .0)
    }
}

/// A reply ready to be handed to the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub profile_id: u32,
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Security profile status report, carried as a Common profile message.
    pub fn status_report(status_code: StatusCode) -> Self {
        Self {
            profile_id: COMMON_PROFILE,
            msg_type: MSG_TYPE_STATUS_REPORT,
            payload: StatusReport::new(SECURITY_PROFILE, status_code)
                .as_bytes()
                .to_vec(),
        }
    }

    pub fn certificate_response(cert: &[u8], related: Option<&[u8]>) -> TlvResult<Self> {
        let mut payload = vec![0u8; MAX_MESSAGE_SIZE];
        let len = encode_certificate_response(&mut payload, cert, related)?;
        payload.truncate(len);
        Ok(Self {
            profile_id: SECURITY_PROFILE,
            msg_type: MSG_TYPE_GET_CERTIFICATE_RESPONSE,
            payload,
        })
    }
}
