//! Response codes and the authority's reply to one message.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::TrustError;
use crate::keyx::KeyResponseData;
use crate::tokens::{MasterToken, ServiceToken, UserIdToken};

/// Outcome of processing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    Ok,
    /// Generic failure; the message cannot succeed as sent.
    Fail,
    /// Retry with the newest master token.
    TransientFailure,
    /// Discard trust state and authenticate from scratch.
    EntityReauth,
    UserReauth,
    /// Resend with key request data.
    KeyxRequired,
    /// Resend renewable with key request data.
    Expired,
    Replayed,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::Ok => "OK",
            ResponseCode::Fail => "FAIL",
            ResponseCode::TransientFailure => "TRANSIENT_FAILURE",
            ResponseCode::EntityReauth => "ENTITY_REAUTH",
            ResponseCode::UserReauth => "USER_REAUTH",
            ResponseCode::KeyxRequired => "KEYX_REQUIRED",
            ResponseCode::Expired => "EXPIRED",
            ResponseCode::Replayed => "REPLAYED",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace detailed error text with a fixed message per code so internal
/// state never reaches the peer.
fn sanitize_error_message(code: ResponseCode) -> &'static str {
    match code {
        ResponseCode::Ok => "",
        ResponseCode::Fail => "Message rejected",
        ResponseCode::TransientFailure => "Temporary failure, retry with the newest master token",
        ResponseCode::EntityReauth => "Entity re-authentication required",
        ResponseCode::UserReauth => "User re-authentication required",
        ResponseCode::KeyxRequired => "Key exchange required",
        ResponseCode::Expired => "Master token expired",
        ResponseCode::Replayed => "Message replayed",
    }
}

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

/// The authority's reply to one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Identifier of the message being answered.
    pub message_id: Uuid,

    pub code: ResponseCode,

    /// The master token the entity should use next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_token: Option<MasterToken>,

    /// Present when new session keys were issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_response_data: Option<KeyResponseData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_token: Option<UserIdToken>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_tokens: Vec<ServiceToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl MessageResponse {
    /// An `OK` response carrying no tokens.
    pub fn ok(message_id: Uuid) -> Self {
        Self {
            message_id,
            code: ResponseCode::Ok,
            master_token: None,
            key_response_data: None,
            user_id_token: None,
            service_tokens: Vec::new(),
            error: None,
        }
    }

    pub fn with_master_token(mut self, master_token: MasterToken) -> Self {
        self.master_token = Some(master_token);
        self
    }

    /// Attach key response data; its master token becomes the response's.
    pub fn with_key_response(mut self, key_response_data: KeyResponseData) -> Self {
        self.master_token = Some(key_response_data.master_token.clone());
        self.key_response_data = Some(key_response_data);
        self
    }

    pub fn with_user_id_token(mut self, user_id_token: Option<UserIdToken>) -> Self {
        self.user_id_token = user_id_token;
        self
    }

    pub fn with_service_tokens(mut self, service_tokens: Vec<ServiceToken>) -> Self {
        self.service_tokens = service_tokens;
        self
    }

    /// An error response for `error`.
    ///
    /// The client sees a sanitized message; the detailed error is logged.
    pub fn error(message_id: Uuid, error: &TrustError) -> Self {
        let code = error.response_code();

        debug!(
            message_id = %message_id,
            code = %code,
            error = %error,
            "Error response (sanitized for client)"
        );

        Self {
            message_id,
            code,
            master_token: None,
            key_response_data: None,
            user_id_token: None,
            service_tokens: Vec::new(),
            error: Some(ErrorDetail {
                message: sanitize_error_message(code).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenErrorKind;

    #[test]
    fn test_code_encoding() {
        let json = serde_json::to_string(&ResponseCode::EntityReauth).unwrap();
        assert_eq!(json, "\"ENTITY_REAUTH\"");
        assert_eq!(ResponseCode::KeyxRequired.to_string(), "KEYX_REQUIRED");
    }

    #[test]
    fn test_error_response_is_sanitized() {
        let error = TrustError::token(TokenErrorKind::SequenceOutOfSync {
            identity: "device-1".to_string(),
            presented: 40,
            newest: 7,
        });
        let response = MessageResponse::error(Uuid::new_v4(), &error);

        assert_eq!(response.code, ResponseCode::EntityReauth);
        let message = response.error.unwrap().message;
        assert!(!message.contains("device-1"));
        assert!(!message.contains("40"));
    }

    #[test]
    fn test_ok_response_serialization() {
        let response = MessageResponse::ok(Uuid::nil());
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"code\":\"OK\""));
        assert!(!json.contains("\"error\""));
        assert!(!json.contains("\"master_token\""));
    }
}
