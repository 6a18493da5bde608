use std::time::{Duration, SystemTime};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{AccessToken, AccessTokenBuf, Nonce, error::Error, server::ErrorResponse};

use super::{ClaimMap, TokenVerifier};

/// OpenID Connect ID token, decoded from its compact serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct IdToken {
	raw: String,
	claims: ClaimMap,
	verified: bool,
}

impl IdToken {
	/// Verifies (when `verifier` has a key) and decodes `raw`.
	pub fn decode(raw: &str, verifier: &TokenVerifier) -> Result<Self, Error> {
		let decoded = verifier.decode(raw)?;
		Ok(Self {
			raw: raw.to_owned(),
			claims: decoded.claims,
			verified: decoded.verified,
		})
	}

	pub fn raw(&self) -> &str {
		&self.raw
	}

	pub fn claims(&self) -> &ClaimMap {
		&self.claims
	}

	/// `false` if no signing key was configured when the token was decoded.
	pub fn is_verified(&self) -> bool {
		self.verified
	}

	pub fn subject(&self) -> Option<&str> {
		self.claims.get_str("sub")
	}

	pub fn issuer(&self) -> Option<&str> {
		self.claims.get_str("iss")
	}

	pub fn nonce(&self) -> Option<&str> {
		self.claims.get_str("nonce")
	}

	pub fn email(&self) -> Option<&str> {
		self.claims.get_str("email")
	}

	/// Checks the `nonce` claim against the one sent in the authorization
	/// request. A token without `nonce` is accepted.
	pub fn matches_nonce(&self, expected: &Nonce) -> bool {
		self.nonce().is_none_or(|nonce| nonce == expected.as_str())
	}
}

/// Token endpoint response, successful or not.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-5.1>
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenResponse {
	pub access_token: Option<AccessTokenBuf>,

	pub token_type: Option<String>,

	/// Lifetime in seconds of the access token.
	pub expires_in: Option<u64>,

	pub refresh_token: Option<String>,

	/// Granted scope, if different from the requested one.
	pub scope: Option<String>,

	/// Compact-serialized ID token.
	pub id_token: Option<String>,

	/// Whether the user asked to be remembered on the login page.
	pub remember: Option<bool>,

	pub error: Option<String>,

	pub error_description: Option<String>,

	pub error_uri: Option<String>,

	#[serde(skip)]
	received_at: Option<SystemTime>,

	#[serde(skip)]
	verifier: TokenVerifier,

	#[serde(skip)]
	parsed_id_token: OnceCell<IdToken>,
}

impl AccessTokenResponse {
	/// Decodes a token endpoint JSON body.
	pub fn decode(json: &str) -> Result<Self, Error> {
		let mut response: Self = serde_json::from_str(json).map_err(Error::invalid_response)?;
		response.received_at = Some(SystemTime::now());
		Ok(response)
	}

	/// Sets the verifier used when the ID token is first accessed.
	pub fn with_verifier(self, verifier: TokenVerifier) -> Self {
		Self {
			verifier,
			parsed_id_token: OnceCell::new(),
			..self
		}
	}

	pub fn access_token(&self) -> Option<&AccessToken> {
		self.access_token.as_deref()
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}

	/// The OAuth error carried by this response, if any.
	pub fn error_response(&self) -> Option<ErrorResponse> {
		self.error.as_ref().map(|error| {
			ErrorResponse::new(
				error.clone(),
				self.error_description.clone(),
				self.error_uri.clone(),
			)
		})
	}

	/// When the access token expires, counted from the moment the response
	/// was decoded.
	pub fn expires_at(&self) -> Option<SystemTime> {
		Some(self.received_at? + Duration::from_secs(self.expires_in?))
	}

	pub fn is_expired(&self) -> bool {
		self.expires_at()
			.is_some_and(|expires_at| expires_at <= SystemTime::now())
	}

	/// The decoded ID token.
	///
	/// Decoding happens on first access and is cached. Signature failures
	/// are returned as [`Error::SignatureInvalid`] and are not cached.
	pub fn id_token(&self) -> Result<Option<&IdToken>, Error> {
		match &self.id_token {
			Some(raw) => self
				.parsed_id_token
				.get_or_try_init(|| IdToken::decode(raw, &self.verifier))
				.map(Some),
			None => Ok(None),
		}
	}
}
