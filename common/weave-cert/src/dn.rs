// Licensed under the Apache-2.0 license

use core::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use weave_tlv::{context_tag, Tag, TlvReader, TlvResult, TlvType, TlvWriter};

use crate::der::{DerWriter, DER_SET_TAG};
use crate::error::{CertificateError, CertificateResult};

/// Weave identifier attribute types. The discriminant is the context tag used
/// inside the DN path; the OID is `1.3.6.1.4.1.41387.1.<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum WeaveIdKind {
    DeviceId = 17,
    ServiceEndpointId = 18,
    CaId = 19,
    SoftwarePublisherId = 20,
}

impl WeaveIdKind {
    fn oid(self) -> [u64; 9] {
        let arc = match self {
            WeaveIdKind::DeviceId => 1,
            WeaveIdKind::ServiceEndpointId => 2,
            WeaveIdKind::CaId => 3,
            WeaveIdKind::SoftwarePublisherId => 4,
        };
        [1, 3, 6, 1, 4, 1, 41387, 1, arc]
    }
}

/// Single-attribute distinguished name naming a Weave entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DistinguishedName {
    pub kind: WeaveIdKind,
    pub id: u64,
}

impl DistinguishedName {
    pub const fn new(kind: WeaveIdKind, id: u64) -> Self {
        Self { kind, id }
    }

    /// Decodes the DN path the reader is positioned on.
    pub(crate) fn decode(reader: &mut TlvReader<'_>) -> CertificateResult<Self> {
        if reader.element_type() != Some(TlvType::Path) {
            return Err(weave_tlv::TlvError::WrongType.into());
        }
        reader.enter_container()?;
        reader.next()?;
        let kind = reader
            .tag()
            .and_then(|t| t.context_number())
            .and_then(|n| WeaveIdKind::try_from(n).ok())
            .ok_or(CertificateError::InvalidDistinguishedName)?;
        let id = reader.get_u64()?;
        reader
            .verify_end_of_container()
            .map_err(|_| CertificateError::InvalidDistinguishedName)?;
        reader.exit_container()?;
        Ok(Self { kind, id })
    }

    pub(crate) fn encode(&self, writer: &mut TlvWriter<'_>, tag: Tag) -> TlvResult<()> {
        writer.start_container(tag, TlvType::Path)?;
        writer.put_u64(context_tag(self.kind.into()), self.id)?;
        writer.end_container()
    }

    /// X.509 `Name` with one RDN holding the id as 16 upper-case hex digits.
    pub(crate) fn der_encode(&self, der: &mut DerWriter) {
        let value = format!("{:016X}", self.id);
        der.sequence(|name| {
            name.nested(DER_SET_TAG, |rdn| {
                rdn.sequence(|attr| {
                    attr.oid(&self.kind.oid());
                    attr.utf8_string(&value);
                })
            })
        });
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:016X}", self.kind, self.id)
    }
}
