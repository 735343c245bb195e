// Licensed under the Apache-2.0 license

use crate::error::{TlvError, TlvResult};

const TAG_CONTROL_ANONYMOUS: u8 = 0x00;
const TAG_CONTROL_CONTEXT: u8 = 0x20;
const TAG_CONTROL_COMMON_2: u8 = 0x40;
const TAG_CONTROL_COMMON_4: u8 = 0x60;
const TAG_CONTROL_IMPLICIT_2: u8 = 0x80;
const TAG_CONTROL_IMPLICIT_4: u8 = 0xA0;
const TAG_CONTROL_FULLY_QUALIFIED_6: u8 = 0xC0;
const TAG_CONTROL_FULLY_QUALIFIED_8: u8 = 0xE0;

/// Element tag.
///
/// Profile ids combine the vendor id in the upper 16 bits with the
/// vendor-specific profile number in the lower 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Anonymous,
    Context(u8),
    CommonProfile(u32),
    /// Profile-specific tag whose profile is implied by the surrounding protocol.
    Implicit(u32),
    Profile { profile_id: u32, tag: u32 },
}

pub const fn context_tag(tag: u8) -> Tag {
    Tag::Context(tag)
}

pub const fn profile_tag(profile_id: u32, tag: u32) -> Tag {
    Tag::Profile { profile_id, tag }
}

impl Tag {
    pub fn context_number(&self) -> Option<u8> {
        match self {
            Tag::Context(n) => Some(*n),
            _ => None,
        }
    }

    /// Tag-control bits plus the number of tag bytes that follow the control byte.
    pub(crate) fn control(&self) -> (u8, usize) {
        match *self {
            Tag::Anonymous => (TAG_CONTROL_ANONYMOUS, 0),
            Tag::Context(_) => (TAG_CONTROL_CONTEXT, 1),
            Tag::CommonProfile(t) if t <= u16::MAX as u32 => (TAG_CONTROL_COMMON_2, 2),
            Tag::CommonProfile(_) => (TAG_CONTROL_COMMON_4, 4),
            Tag::Implicit(t) if t <= u16::MAX as u32 => (TAG_CONTROL_IMPLICIT_2, 2),
            Tag::Implicit(_) => (TAG_CONTROL_IMPLICIT_4, 4),
            Tag::Profile { tag, .. } if tag <= u16::MAX as u32 => {
                (TAG_CONTROL_FULLY_QUALIFIED_6, 6)
            }
            Tag::Profile { .. } => (TAG_CONTROL_FULLY_QUALIFIED_8, 8),
        }
    }

    pub(crate) fn encode_into(&self, out: &mut [u8]) {
        match *self {
            Tag::Anonymous => {}
            Tag::Context(t) => out[0] = t,
            Tag::CommonProfile(t) | Tag::Implicit(t) => {
                if out.len() == 2 {
                    out.copy_from_slice(&(t as u16).to_le_bytes());
                } else {
                    out.copy_from_slice(&t.to_le_bytes());
                }
            }
            Tag::Profile { profile_id, tag } => {
                let vendor = (profile_id >> 16) as u16;
                let number = profile_id as u16;
                out[..2].copy_from_slice(&vendor.to_le_bytes());
                out[2..4].copy_from_slice(&number.to_le_bytes());
                if out.len() == 6 {
                    out[4..].copy_from_slice(&(tag as u16).to_le_bytes());
                } else {
                    out[4..].copy_from_slice(&tag.to_le_bytes());
                }
            }
        }
    }

    /// Decodes the tag that follows a control byte. Returns the tag and the
    /// number of bytes consumed.
    pub(crate) fn decode(control: u8, bytes: &[u8]) -> TlvResult<(Tag, usize)> {
        let tag_control = control & crate::types::CONTROL_TAG_MASK;
        let need = match tag_control {
            TAG_CONTROL_ANONYMOUS => 0,
            TAG_CONTROL_CONTEXT => 1,
            TAG_CONTROL_COMMON_2 | TAG_CONTROL_IMPLICIT_2 => 2,
            TAG_CONTROL_COMMON_4 | TAG_CONTROL_IMPLICIT_4 => 4,
            TAG_CONTROL_FULLY_QUALIFIED_6 => 6,
            TAG_CONTROL_FULLY_QUALIFIED_8 => 8,
            _ => return Err(TlvError::InvalidTag),
        };
        let bytes = bytes.get(..need).ok_or(TlvError::UnderRun)?;
        let le16 = |b: &[u8]| u16::from_le_bytes([b[0], b[1]]) as u32;
        let le32 = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let tag = match tag_control {
            TAG_CONTROL_ANONYMOUS => Tag::Anonymous,
            TAG_CONTROL_CONTEXT => Tag::Context(bytes[0]),
            TAG_CONTROL_COMMON_2 => Tag::CommonProfile(le16(bytes)),
            TAG_CONTROL_COMMON_4 => Tag::CommonProfile(le32(bytes)),
            TAG_CONTROL_IMPLICIT_2 => Tag::Implicit(le16(bytes)),
            TAG_CONTROL_IMPLICIT_4 => Tag::Implicit(le32(bytes)),
            _ => {
                let profile_id = (le16(&bytes[..2]) << 16) | le16(&bytes[2..4]);
                let tag = if need == 6 {
                    le16(&bytes[4..])
                } else {
                    le32(&bytes[4..])
                };
                Tag::Profile { profile_id, tag }
            }
        };
        Ok((tag, need))
    }
}
