// Licensed under the Apache-2.0 license

//! Reader and writer for the Weave tag-length-value encoding.

mod error;
mod reader;
mod tag;
mod types;
mod writer;

pub use error::{TlvError, TlvResult};
pub use reader::TlvReader;
pub use tag::{context_tag, profile_tag, Tag};
pub use types::{ElementType, TlvType};
pub use writer::TlvWriter;
