//! Client configuration.
//!
//! [`OAuthConfig`] describes one registered client of the identity and
//! entitlement service. It is plain data: it is built (or deserialized) by the
//! caller, borrowed by every component for the duration of a flow and never
//! mutated by this crate.
use iref::{Uri, UriBuf};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{ClientId, ClientIdBuf, ScopeBuf, error::Error, token::TokenVerifier};

/// Client secret of a confidential client.
///
/// Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
	pub fn new(secret: impl Into<String>) -> Self {
		Self(secret.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Debug for ClientSecret {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("ClientSecret(..)")
	}
}

/// Public key used to verify compact signed tokens (ID tokens and
/// entitlement decision tokens).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SigningKey {
	/// PEM-encoded RSA public key (`RS*` and `PS*` algorithms).
	RsaPem { pem: String },

	/// RSA public key given as base64url modulus and exponent, as found in a
	/// JWK.
	RsaComponents { n: String, e: String },

	/// PEM-encoded EC public key (`ES*` algorithms).
	EcPem { pem: String },

	/// Shared secret (`HS*` algorithms).
	Hmac { secret: String },
}

impl std::fmt::Debug for SigningKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::RsaPem { .. } => f.write_str("SigningKey::RsaPem"),
			Self::RsaComponents { .. } => f.write_str("SigningKey::RsaComponents"),
			Self::EcPem { .. } => f.write_str("SigningKey::EcPem"),
			Self::Hmac { .. } => f.write_str("SigningKey::Hmac(..)"),
		}
	}
}

fn default_use_pkce() -> bool {
	true
}

/// Configuration of one OAuth 2.0 / OpenID Connect client.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
	pub client_id: Option<ClientIdBuf>,

	/// Only sent when PKCE is disabled.
	pub client_secret: Option<ClientSecret>,

	pub scope: Option<ScopeBuf>,

	pub redirect_uri: Option<UriBuf>,

	pub authorization_endpoint: Option<UriBuf>,

	pub token_endpoint: Option<UriBuf>,

	pub userinfo_endpoint: Option<UriBuf>,

	/// Expected `iss` claim of ID tokens.
	pub issuer: Option<String>,

	pub signing_key: Option<SigningKey>,

	#[serde(default = "default_use_pkce")]
	pub use_pkce: bool,

	/// Accept invalid TLS certificates. Development only.
	#[serde(default)]
	pub allow_insecure_certs: bool,

	/// Asks the login page to offer a "remember me" option.
	#[serde(default)]
	pub show_remember_me: bool,
}

impl Default for OAuthConfig {
	fn default() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			scope: None,
			redirect_uri: None,
			authorization_endpoint: None,
			token_endpoint: None,
			userinfo_endpoint: None,
			issuer: None,
			signing_key: None,
			use_pkce: default_use_pkce(),
			allow_insecure_certs: false,
			show_remember_me: false,
		}
	}
}

impl OAuthConfig {
	pub fn new(client_id: ClientIdBuf) -> Self {
		Self {
			client_id: Some(client_id),
			..Default::default()
		}
	}

	pub fn from_json_str(json: &str) -> Result<Self, Error> {
		serde_json::from_str(json).map_err(Error::configuration)
	}

	pub fn from_json_slice(json: &[u8]) -> Result<Self, Error> {
		serde_json::from_slice(json).map_err(Error::configuration)
	}

	pub fn with_client_secret(self, client_secret: ClientSecret) -> Self {
		Self {
			client_secret: Some(client_secret),
			..self
		}
	}

	pub fn with_scope(self, scope: ScopeBuf) -> Self {
		Self {
			scope: Some(scope),
			..self
		}
	}

	pub fn with_redirect_uri(self, redirect_uri: UriBuf) -> Self {
		Self {
			redirect_uri: Some(redirect_uri),
			..self
		}
	}

	pub fn with_authorization_endpoint(self, authorization_endpoint: UriBuf) -> Self {
		Self {
			authorization_endpoint: Some(authorization_endpoint),
			..self
		}
	}

	pub fn with_token_endpoint(self, token_endpoint: UriBuf) -> Self {
		Self {
			token_endpoint: Some(token_endpoint),
			..self
		}
	}

	pub fn with_userinfo_endpoint(self, userinfo_endpoint: UriBuf) -> Self {
		Self {
			userinfo_endpoint: Some(userinfo_endpoint),
			..self
		}
	}

	pub fn with_issuer(self, issuer: impl Into<String>) -> Self {
		Self {
			issuer: Some(issuer.into()),
			..self
		}
	}

	pub fn with_signing_key(self, signing_key: SigningKey) -> Self {
		Self {
			signing_key: Some(signing_key),
			..self
		}
	}

	pub fn with_pkce(self, use_pkce: bool) -> Self {
		Self { use_pkce, ..self }
	}

	pub fn with_show_remember_me(self, show_remember_me: bool) -> Self {
		Self {
			show_remember_me,
			..self
		}
	}

	pub fn with_allow_insecure_certs(self, allow_insecure_certs: bool) -> Self {
		Self {
			allow_insecure_certs,
			..self
		}
	}

	/// The client identifier, which must be present and non-empty.
	pub fn require_client_id(&self) -> Result<&ClientId, Error> {
		match self.client_id.as_deref() {
			Some(client_id) if !client_id.as_str().is_empty() => Ok(client_id),
			_ => Err(Error::configuration("missing `client_id`")),
		}
	}

	pub fn require_authorization_endpoint(&self) -> Result<&Uri, Error> {
		self.authorization_endpoint
			.as_deref()
			.ok_or_else(|| Error::configuration("missing `authorization_endpoint`"))
	}

	pub fn require_token_endpoint(&self) -> Result<&Uri, Error> {
		self.token_endpoint
			.as_deref()
			.ok_or_else(|| Error::configuration("missing `token_endpoint`"))
	}

	pub fn require_userinfo_endpoint(&self) -> Result<&Uri, Error> {
		self.userinfo_endpoint
			.as_deref()
			.ok_or_else(|| Error::configuration("missing `userinfo_endpoint`"))
	}

	/// Verifier for ID tokens issued to this client.
	pub fn token_verifier(&self) -> TokenVerifier {
		TokenVerifier::new(self.signing_key.clone())
			.with_issuer(self.issuer.clone())
			.with_audience(self.client_id.as_ref().map(|id| id.as_str().to_owned()))
	}

	/// Builds the shared HTTP client used for token and decision requests.
	#[cfg(feature = "reqwest")]
	pub fn http_client(&self) -> Result<reqwest::Client, Error> {
		if self.allow_insecure_certs {
			log::warn!("TLS certificate validation is disabled");
		}

		reqwest::Client::builder()
			.danger_accept_invalid_certs(self.allow_insecure_certs)
			.build()
			.map_err(Error::configuration)
	}
}
