//! Entity (client) side of trust establishment and renewal.

mod session;

pub use session::{EntitySession, KeyExchangeRequest, PendingExchange, RequestOptions};
