//! Error payloads returned by the authorization and token endpoints.
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// An OAuth 2.0 error response.
///
/// This is the standard error format returned by the authorization server,
/// either as redirect parameters
/// ([RFC 6749 Section 4.1.2.1](https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1))
/// or as a token endpoint JSON body
/// ([RFC 6749 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2)).
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorResponse<T = String> {
	/// A single error code string.
	pub error: T,

	/// Human-readable text providing additional information about the error.
	pub error_description: Option<String>,

	/// A URI identifying a human-readable web page with information about
	/// the error.
	pub error_uri: Option<String>,
}

impl<T> ErrorResponse<T> {
	/// Creates a new error response.
	pub fn new(error: T, error_description: Option<String>, error_uri: Option<String>) -> Self {
		Self {
			error,
			error_description,
			error_uri,
		}
	}
}

impl ErrorResponse {
	/// Error code recorded when the callback `state` differs from the one
	/// that was sent.
	pub const INVALID_STATE: &'static str = "invalid_state";

	/// Error code recorded when the ID token `nonce` differs from the one
	/// that was sent.
	pub const INVALID_NONCE: &'static str = "invalid_nonce";

	/// Error code recorded when the token endpoint could not be reached.
	pub const REQUEST_FAILED: &'static str = "request_failed";

	/// Builds an error response carrying only a code and description.
	pub fn described(error: &str, description: impl Into<String>) -> Self {
		Self::new(error.to_owned(), Some(description.into()), None)
	}
}

/// The authorization endpoint error codes.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationErrorCode {
	/// The request is missing a required parameter, includes an invalid parameter value,
	/// includes a parameter more than once, or is otherwise malformed.
	InvalidRequest,

	/// The client is not authorized to request an authorization code using this method.
	UnauthorizedClient,

	/// The resource owner or authorization server denied the request.
	AccessDenied,

	/// The authorization server does not support obtaining an authorization code using this method.
	UnsupportedResponseType,

	/// The requested scope is invalid, unknown, or malformed.
	InvalidScope,

	/// The authorization server encountered an unexpected condition.
	ServerError,

	/// The authorization server is temporarily unable to handle the request.
	TemporarilyUnavailable,
}

impl AuthorizationErrorCode {
	/// Parses a wire error code, returning `None` for extension codes.
	pub fn from_code(code: &str) -> Option<Self> {
		serde_json::from_value(serde_json::Value::String(code.to_owned())).ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_response_skips_absent_fields() {
		let response = ErrorResponse::described("access_denied", "user declined");
		assert_eq!(
			serde_json::to_string(&response).unwrap(),
			r#"{"error":"access_denied","error_description":"user declined"}"#
		);
	}

	#[test]
	fn known_error_codes() {
		assert_eq!(
			AuthorizationErrorCode::from_code("access_denied"),
			Some(AuthorizationErrorCode::AccessDenied)
		);
		assert_eq!(AuthorizationErrorCode::from_code("login_required"), None);
	}
}
