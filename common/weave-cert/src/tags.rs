// Licensed under the Apache-2.0 license

//! TLV tag assignments for Weave certificates.

use weave_tlv::{profile_tag, Tag};

pub const SECURITY_PROFILE: u32 = 0x0000_0004;
pub const WEAVE_CERTIFICATE_TAG: Tag = profile_tag(SECURITY_PROFILE, 1);

pub const SERIAL_NUMBER: u8 = 1;
pub const SIGNATURE_ALGORITHM: u8 = 2;
pub const ISSUER: u8 = 3;
pub const NOT_BEFORE: u8 = 4;
pub const NOT_AFTER: u8 = 5;
pub const SUBJECT: u8 = 6;
pub const PUBLIC_KEY_ALGORITHM: u8 = 7;
pub const ELLIPTIC_CURVE_IDENTIFIER: u8 = 8;
pub const ELLIPTIC_CURVE_PUBLIC_KEY: u8 = 10;
pub const ECDSA_SIGNATURE: u8 = 12;
pub const AUTHORITY_KEY_IDENTIFIER: u8 = 13;
pub const SUBJECT_KEY_IDENTIFIER: u8 = 14;
pub const KEY_USAGE: u8 = 15;
pub const BASIC_CONSTRAINTS: u8 = 16;
pub const EXTENDED_KEY_USAGE: u8 = 17;

pub const ECDSA_SIGNATURE_R: u8 = 1;
pub const ECDSA_SIGNATURE_S: u8 = 2;

// Members shared by every extension structure.
pub const EXTENSION_CRITICAL: u8 = 1;
pub const KEY_IDENTIFIER: u8 = 2;
pub const KEY_USAGE_FLAGS: u8 = 2;
pub const KEY_PURPOSES: u8 = 2;
pub const BASIC_CONSTRAINTS_IS_CA: u8 = 2;
pub const BASIC_CONSTRAINTS_PATH_LEN: u8 = 3;
