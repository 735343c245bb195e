// Licensed under the Apache-2.0 license

//! Wire constants for the certificate provisioning exchange.

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const COMMON_PROFILE: u32 = 0x0000_0000;
pub const SECURITY_PROFILE: u32 = weave_cert::tags::SECURITY_PROFILE;

/// Message types within the Security profile.
pub const MSG_TYPE_GET_CERTIFICATE_REQUEST: u8 = 10;
pub const MSG_TYPE_GET_CERTIFICATE_RESPONSE: u8 = 11;

/// Message type of a status report within the Common profile.
pub const MSG_TYPE_STATUS_REPORT: u8 = 1;

pub const MAX_MESSAGE_SIZE: usize = 4096;
pub const MAX_CERT_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RequestType {
    /// First operational certificate for a device holding a self-signed one.
    GetInitialOpDeviceCert = 1,
    /// Replacement of a service-issued operational certificate.
    RotateOpDeviceCert = 2,
}

/// Status codes carried in Security profile status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum StatusCode {
    UnauthorizedGetCertRequest = 0x0012,
    NoNewCertRequired = 0x0013,
}

/// Context tags of the GetCertificateRequest structure.
pub mod request_tags {
    pub const REQ_TYPE: u8 = 1;
    pub const AUTHORIZE_PAIRING_TOKEN: u8 = 2;
    pub const AUTHORIZE_PAIRING_INIT_DATA: u8 = 3;
    pub const OP_DEVICE_CERT: u8 = 4;
    pub const OP_RELATED_CERTS: u8 = 5;
    pub const MANUF_ATTEST_WEAVE_CERT: u8 = 6;
    pub const MANUF_ATTEST_WEAVE_REL_CERTS: u8 = 7;
    pub const MANUF_ATTEST_X509_CERT: u8 = 8;
    pub const MANUF_ATTEST_X509_REL_CERTS: u8 = 9;
    pub const MANUF_ATTEST_HMAC_KEY_ID: u8 = 10;
    pub const MANUF_ATTEST_HMAC_META_DATA: u8 = 11;
    pub const OP_DEVICE_SIG_ALGO: u8 = 12;
    pub const OP_DEVICE_SIG_ECDSA: u8 = 13;
    pub const MANUF_ATTEST_SIG_ALGO: u8 = 14;
    pub const MANUF_ATTEST_SIG_ECDSA: u8 = 15;
    pub const MANUF_ATTEST_SIG_RSA: u8 = 16;
    pub const MANUF_ATTEST_SIG_HMAC: u8 = 17;
}

/// Context tags of the GetCertificateResponse structure.
pub mod response_tags {
    pub const OP_DEVICE_CERT: u8 = 1;
    pub const RELATED_CERTS: u8 = 2;
}
