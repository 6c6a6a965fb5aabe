//! Trust tokens.
//!
//! - [`MasterToken`]: entity identity, sealed session keys, validity window
//!   and sequence number, signed by the authority.
//! - [`UserIdToken`] and [`ServiceToken`]: secondary tokens bound to a master
//!   token by serial number.
//! - [`SequenceSpace`]: wraparound-aware ordering of token generations.

mod clock;
mod factory;
mod master;
mod sequence;
mod service;
mod user_id;

pub use clock::{truncate_to_seconds, Clock, FixedClock, SystemClock};
pub use factory::TokenFactory;
pub use master::{MasterToken, MasterTokenData, Validity};
pub use sequence::SequenceSpace;
pub use service::{ServiceToken, ServiceTokenData};
pub use user_id::{UserIdToken, UserIdTokenData};
