//! Message-level protocol types.
//!
//! An entity sends a [`MessageHeader`]; the authority answers with a
//! [`MessageResponse`] whose [`ResponseCode`] is the only outcome signal.
//! Both travel through a [`Serializer`], JSON by default.

mod codec;
mod header;
pub(crate) mod hex_bytes;
mod response;

pub use codec::{JsonSerializer, Serializer, DEFAULT_MAX_MESSAGE_SIZE};
pub use header::{EntityCredentials, HeaderData, MessageHeader};
pub use response::{ErrorDetail, MessageResponse, ResponseCode};
