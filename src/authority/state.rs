//! Trust states an entity moves through.

use std::fmt;

/// Trust state reached by processing one message.
///
/// `NoTrust -> Authenticating -> Trusted -> Renewing -> Trusted`, with an
/// edge from any state to `Rejected`. A message that completed a renewal
/// reports `Renewing`; the entity is `Trusted` under the new token after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustState {
    NoTrust,
    /// Entity authenticated, no master token issued yet.
    Authenticating,
    Trusted,
    Renewing,
    Rejected,
}

impl TrustState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustState::NoTrust => "no_trust",
            TrustState::Authenticating => "authenticating",
            TrustState::Trusted => "trusted",
            TrustState::Renewing => "renewing",
            TrustState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TrustState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
