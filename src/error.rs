//! Error taxonomy shared by every component of the client.
use crate::server::ErrorResponse;

/// Result type defaulting to the crate [`enum@Error`].
pub type Result<T, E = Error> = ::std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Required configuration is missing or malformed.
	///
	/// Always raised before any user-visible action is taken.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// The user (or the host application) cancelled the authorization.
	#[error("authorization cancelled")]
	Cancelled,

	/// No redirect was captured before the deadline.
	#[error("authorization timed out")]
	Timeout,

	/// The server answered with an OAuth error payload.
	#[error("protocol error: {}", .0.error)]
	Protocol(ErrorResponse),

	/// A token signature did not verify against the configured key.
	#[error("token signature is invalid")]
	SignatureInvalid,

	/// A compact token is malformed, expired or carries unexpected claims.
	#[error("invalid token: {0}")]
	InvalidToken(String),

	/// The decision endpoint returned something that cannot be decoded.
	#[error("invalid server response: {0}")]
	InvalidServerResponse(String),

	/// An operation was invoked on an object in the wrong state.
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// Network or HTTP layer failure.
	#[error("transport error: {0}")]
	Transport(String),

	/// The server responded with an unexpected status code.
	#[error("server responded with status code: {0}")]
	ServerStatus(http::StatusCode),
}

impl Error {
	pub fn configuration(msg: impl ToString) -> Self {
		let msg = msg.to_string();
		log::error!("configuration error: {msg}");
		Self::Configuration(msg)
	}

	pub fn transport(e: impl ToString) -> Self {
		let msg = e.to_string();
		log::error!("transport error: {msg}");
		Self::Transport(msg)
	}

	pub fn invalid_response(e: impl ToString) -> Self {
		let msg = e.to_string();
		log::error!("invalid server response: {msg}");
		Self::InvalidServerResponse(msg)
	}

	pub fn invalid_token(e: impl ToString) -> Self {
		let msg = e.to_string();
		log::error!("invalid token: {msg}");
		Self::InvalidToken(msg)
	}

	pub fn invalid_state(msg: impl ToString) -> Self {
		let msg = msg.to_string();
		log::error!("invalid state: {msg}");
		Self::InvalidState(msg)
	}

	pub fn signature_invalid() -> Self {
		log::error!("token signature verification failed");
		Self::SignatureInvalid
	}

	pub fn protocol(response: ErrorResponse) -> Self {
		log::error!("protocol error: {}", response.error);
		Self::Protocol(response)
	}

	pub fn server(status: http::StatusCode) -> Self {
		log::error!("unexpected server response status: {status}");
		Self::ServerStatus(status)
	}

	pub fn cancelled() -> Self {
		log::info!("authorization cancelled");
		Self::Cancelled
	}

	pub fn timeout() -> Self {
		log::info!("authorization timed out");
		Self::Timeout
	}

	/// Returns `true` for user cancellation and timeouts.
	///
	/// Both are terminal but neither is a failure of the client.
	pub fn is_cancellation(&self) -> bool {
		matches!(self, Self::Cancelled | Self::Timeout)
	}
}

impl From<jsonwebtoken::errors::Error> for Error {
	fn from(e: jsonwebtoken::errors::Error) -> Self {
		use jsonwebtoken::errors::ErrorKind;

		match e.kind() {
			ErrorKind::InvalidSignature
			| ErrorKind::InvalidAlgorithm
			| ErrorKind::InvalidKeyFormat
			| ErrorKind::InvalidRsaKey(_)
			| ErrorKind::InvalidEcdsaKey => Self::signature_invalid(),
			_ => Self::invalid_token(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cancellation_kinds() {
		assert!(Error::Cancelled.is_cancellation());
		assert!(Error::Timeout.is_cancellation());
		assert!(!Error::SignatureInvalid.is_cancellation());
		assert!(!Error::transport("connection reset").is_cancellation());
	}

	#[test]
	fn protocol_error_displays_code() {
		let e = Error::protocol(ErrorResponse::new(
			"invalid_grant".to_owned(),
			Some("expired".to_owned()),
			None,
		));
		assert_eq!(e.to_string(), "protocol error: invalid_grant");
	}
}
