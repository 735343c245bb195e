// Licensed under the Apache-2.0 license

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TlvError {
    #[error("output buffer too small")]
    BufferTooSmall,
    #[error("input ended inside an element")]
    UnderRun,
    #[error("end of TLV container")]
    EndOfTlv,
    #[error("element has the wrong type")]
    WrongType,
    #[error("unexpected element")]
    UnexpectedElement,
    #[error("invalid tag encoding")]
    InvalidTag,
    #[error("invalid element type {0:#04x}")]
    InvalidElementType(u8),
    #[error("invalid length field")]
    InvalidLength,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("integer value out of range")]
    IntegerOverflow,
    #[error("container left open")]
    ContainerOpen,
    #[error("not inside a container")]
    NotInContainer,
    #[error("data after end of container")]
    TrailingData,
}

pub type TlvResult<T> = Result<T, TlvError>;
