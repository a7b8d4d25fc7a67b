// ============================================
// File: crates/slashauth-core/src/protocol/envelope.rs
// ============================================
//! # Request / Response Envelopes
//!
//! ## Creation Reason
//! JSON shapes exchanged once the connection (and optionally the secure
//! channel) is up, plus the closed set of protocol methods.
//!
//! ## Main Functionality
//! - `Method`: closed enum `authz | magiclink | requestToken`
//! - `RequestEnvelope`: `{method, params, publicKey, nonce?, signature?}`
//! - `ResponseEnvelope`: `{result, signature?}` or `{error: {message}}`
//! - `EncryptedEnvelope`: `{encrypted: <base64 channel frame>}`
//! - `AuthzGrant` / `MagicLink`: typed payloads applications may return
//! - `canonical_json`: the sorted-key compact form signed in responses
//!
//! ## Wire Examples
//! ```text
//! {"method":"authz","params":{"token":"deadbeef"},"publicKey":"68..","nonce":"deadbeef","signature":"9a.."}
//! {"result":{"resources":["foo"],"status":"ok"},"signature":"41.."}
//! {"error":{"message":"Invalid signature"}}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `method` stays a string on the wire so an unknown name still parses
//!   and can be answered with an error envelope; convert with
//!   [`RequestEnvelope::method`] before dispatching
//! - serde_json must NOT be built with `preserve_order`; canonical JSON
//!   relies on the default sorted `Map`
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

// ============================================
// Method
// ============================================

/// Protocol operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Authorize using an out-of-band token.
    #[serde(rename = "authz")]
    Authz,
    /// Obtain a magic link after re-proving identity.
    #[serde(rename = "magiclink")]
    Magiclink,
    /// Obtain a fresh single-use token.
    #[serde(rename = "requestToken")]
    RequestToken,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authz => "authz",
            Self::Magiclink => "magiclink",
            Self::RequestToken => "requestToken",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "authz" => Ok(Self::Authz),
            "magiclink" => Ok(Self::Magiclink),
            "requestToken" => Ok(Self::RequestToken),
            other => Err(CoreError::UnknownMethod(other.to_string())),
        }
    }
}

// ============================================
// RequestEnvelope
// ============================================

/// A client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Method name (see [`Method`]).
    pub method: String,
    /// Method parameters; `{"token": ..}` for authz and magiclink.
    #[serde(default)]
    pub params: Value,
    /// Caller's Ed25519 public key (hex).
    pub public_key: String,
    /// Nonce the signature was made over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Hex signature over `nonce:publicKey`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl RequestEnvelope {
    /// Builds an unsigned request.
    pub fn new(method: Method, params: Value, public_key: impl Into<String>) -> Self {
        Self {
            method: method.as_str().to_string(),
            params,
            public_key: public_key.into(),
            nonce: None,
            signature: None,
        }
    }

    /// Attaches the nonce and signature.
    #[must_use]
    pub fn signed(mut self, nonce: impl Into<String>, signature: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self.signature = Some(signature.into());
        self
    }

    /// Parses the method name into the closed enum.
    ///
    /// # Errors
    /// `UnknownMethod` for names outside the method set.
    pub fn method(&self) -> Result<Method> {
        self.method.parse()
    }

    /// `params.token`, when present and a string.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.params.get("token").and_then(Value::as_str)
    }

    /// Nonce that binds the response to this request: the explicit nonce,
    /// else the token, else empty.
    #[must_use]
    pub fn binding_nonce(&self) -> &str {
        self.nonce
            .as_deref()
            .or_else(|| self.token())
            .unwrap_or_default()
    }
}

// ============================================
// ResponseEnvelope
// ============================================

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure reason.
    pub message: String,
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Successful result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Hex server signature over `requestNonce:canonicalJson(result)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ResponseEnvelope {
    /// Successful response without signature.
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
            signature: None,
        }
    }

    /// Error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(ErrorBody {
                message: message.into(),
            }),
            signature: None,
        }
    }

    /// Attaches a server signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Returns `true` for an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Splits into the result or the remote error message.
    ///
    /// # Errors
    /// The remote message; a response carrying neither field is reported
    /// as malformed.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(err.message),
            (Some(result), None) => Ok(result),
            (None, None) => Err("Malformed response: neither result nor error".to_string()),
        }
    }
}

// ============================================
// EncryptedEnvelope
// ============================================

/// Channel-encrypted frame carrying a request or response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 of the [`SecureChannel`](crate::crypto::SecureChannel) frame.
    pub encrypted: String,
}

// ============================================
// Application payloads
// ============================================

/// Outcome reported by an `authz` grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthzStatus {
    /// Authorized.
    Ok,
    /// Rejected by the application.
    Error,
}

/// Typed `authz` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzGrant {
    /// Grant outcome.
    pub status: AuthzStatus,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Resources the caller may access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
}

impl AuthzGrant {
    /// Successful grant for `resources`.
    pub fn ok<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: AuthzStatus::Ok,
            message: None,
            resources: Some(resources.into_iter().map(Into::into).collect()),
        }
    }

    /// Application-level refusal.
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            status: AuthzStatus::Error,
            message: Some(message.into()),
            resources: None,
        }
    }

    /// JSON form for returning from a handler.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Typed `magiclink` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLink {
    /// Link delivered out of band.
    pub url: String,
    /// Expiry (Unix seconds).
    pub valid_until: u64,
}

impl MagicLink {
    /// JSON form for returning from a handler.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================
// Canonical JSON
// ============================================

/// Compact JSON with object keys in sorted order.
///
/// # Errors
/// Propagates serde_json failures as `MalformedMessage`.
pub fn canonical_json(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CoreError::malformed(e.to_string()))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse() {
        assert_eq!("authz".parse::<Method>().unwrap(), Method::Authz);
        assert_eq!("magiclink".parse::<Method>().unwrap(), Method::Magiclink);
        assert_eq!("requestToken".parse::<Method>().unwrap(), Method::RequestToken);

        let err = "logout".parse::<Method>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown method: logout");
    }

    #[test]
    fn test_request_wire_shape() {
        let req = RequestEnvelope::new(Method::Authz, json!({"token": "deadbeef"}), "ab")
            .signed("deadbeef", "99");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "authz",
                "params": {"token": "deadbeef"},
                "publicKey": "ab",
                "nonce": "deadbeef",
                "signature": "99"
            })
        );
        assert_eq!(req.token(), Some("deadbeef"));
    }

    #[test]
    fn test_unknown_method_still_parses_envelope() {
        let raw = r#"{"method":"logout","publicKey":"ab"}"#;
        let req: RequestEnvelope = serde_json::from_str(raw).unwrap();
        assert!(matches!(req.method(), Err(CoreError::UnknownMethod(m)) if m == "logout"));
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_binding_nonce_fallback() {
        let mut req = RequestEnvelope::new(Method::Magiclink, json!({"token": "t1"}), "ab");
        assert_eq!(req.binding_nonce(), "t1");
        req.nonce = Some("n1".into());
        assert_eq!(req.binding_nonce(), "n1");
        let bare = RequestEnvelope::new(Method::RequestToken, Value::Null, "ab");
        assert_eq!(bare.binding_nonce(), "");
    }

    #[test]
    fn test_response_shapes() {
        let err = ResponseEnvelope::error("Invalid signature");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"error": {"message": "Invalid signature"}})
        );
        assert_eq!(err.into_result(), Err("Invalid signature".to_string()));

        let ok = ResponseEnvelope::ok(json!({"token": "abc"})).with_signature("ff");
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"result": {"token": "abc"}, "signature": "ff"})
        );
        assert_eq!(ok.into_result(), Ok(json!({"token": "abc"})));

        let empty: ResponseEnvelope = serde_json::from_str("{}").unwrap();
        assert!(empty.into_result().is_err());
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value: Value = serde_json::from_str(r#"{"b":1,"a":{"d":2,"c":3}}"#).unwrap();
        assert_eq!(canonical_json(&value).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_typed_payloads() {
        assert_eq!(
            AuthzGrant::ok(["foo", "bar"]).to_value(),
            json!({"status": "ok", "resources": ["foo", "bar"]})
        );
        assert_eq!(
            AuthzGrant::denied("nope").to_value(),
            json!({"status": "error", "message": "nope"})
        );
        let link = MagicLink {
            url: "https://example.com".into(),
            valid_until: 1000,
        };
        assert_eq!(
            link.to_value(),
            json!({"url": "https://example.com", "validUntil": 1000})
        );
    }
}
