use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::{config::SigningKey, error::Error};

use super::ClaimMap;

/// Clock skew tolerated when checking `exp`.
const LEEWAY: Duration = Duration::from_secs(60);

/// Claims of a compact token together with how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
	pub claims: ClaimMap,

	/// `false` when no key was configured and the signature was not checked.
	pub verified: bool,
}

/// Verifies and decodes compact-serialized signed tokens.
///
/// Without a key, tokens are decoded but not verified; the result says so
/// and a warning is logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenVerifier {
	key: Option<SigningKey>,
	issuer: Option<String>,
	audience: Option<String>,
}

impl TokenVerifier {
	pub fn new(key: Option<SigningKey>) -> Self {
		Self {
			key,
			issuer: None,
			audience: None,
		}
	}

	/// Expected `iss` claim.
	pub fn with_issuer(self, issuer: Option<String>) -> Self {
		Self { issuer, ..self }
	}

	/// Value that must appear in `aud` when the token has one.
	pub fn with_audience(self, audience: Option<String>) -> Self {
		Self { audience, ..self }
	}

	pub fn has_key(&self) -> bool {
		self.key.is_some()
	}

	pub fn decode(&self, token: &str) -> Result<DecodedToken, Error> {
		let decoded = match &self.key {
			Some(key) => DecodedToken {
				claims: verify_signature(token, key)?,
				verified: true,
			},
			None => {
				log::warn!("no signing key configured, token decoded without verification");
				DecodedToken {
					claims: decode_unverified(token)?,
					verified: false,
				}
			}
		};

		self.check_claims(&decoded.claims)?;
		Ok(decoded)
	}

	fn check_claims(&self, claims: &ClaimMap) -> Result<(), Error> {
		if let Some(exp) = claims.get_i64("exp") {
			let now = SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.unwrap_or_default()
				.as_secs();
			if exp.saturating_add(LEEWAY.as_secs() as i64) < now as i64 {
				return Err(Error::invalid_token("token has expired"));
			}
		}

		if let Some(issuer) = &self.issuer {
			if claims.get_str("iss") != Some(issuer.as_str()) {
				return Err(Error::invalid_token("unexpected `iss` claim"));
			}
		}

		if let Some(audience) = &self.audience {
			if claims.contains("aud") && !claims.has_value("aud", audience) {
				return Err(Error::invalid_token("token is not intended for this client"));
			}
		}

		Ok(())
	}
}

fn verify_signature(token: &str, key: &SigningKey) -> Result<ClaimMap, Error> {
	let header = jsonwebtoken::decode_header(token)?;
	let decoding_key = decoding_key(key, header.alg)?;

	let mut validation = Validation::new(header.alg);
	validation.required_spec_claims.clear();
	validation.validate_exp = false;
	validation.validate_aud = false;

	let data = jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation)?;
	Ok(data.claims.into())
}

fn decoding_key(key: &SigningKey, alg: Algorithm) -> Result<DecodingKey, Error> {
	use Algorithm::*;

	match (key, alg) {
		(SigningKey::RsaPem { pem }, RS256 | RS384 | RS512 | PS256 | PS384 | PS512) => {
			DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(Error::configuration)
		}
		(SigningKey::RsaComponents { n, e }, RS256 | RS384 | RS512 | PS256 | PS384 | PS512) => {
			DecodingKey::from_rsa_components(n, e).map_err(Error::configuration)
		}
		(SigningKey::EcPem { pem }, ES256 | ES384) => {
			DecodingKey::from_ec_pem(pem.as_bytes()).map_err(Error::configuration)
		}
		(SigningKey::Hmac { secret }, HS256 | HS384 | HS512) => {
			Ok(DecodingKey::from_secret(secret.as_bytes()))
		}
		_ => {
			log::error!("token algorithm {alg:?} does not match the configured key");
			Err(Error::signature_invalid())
		}
	}
}

/// Decodes the payload of a compact token without checking its signature.
pub fn decode_unverified(token: &str) -> Result<ClaimMap, Error> {
	let mut parts = token.trim().split('.');

	let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(_), Some(payload), Some(_), None) => payload,
		_ => return Err(Error::invalid_token("not a compact-serialized token")),
	};

	let bytes = BASE64_URL_SAFE_NO_PAD
		.decode(payload)
		.map_err(Error::invalid_token)?;

	serde_json::from_slice::<Map<String, Value>>(&bytes)
		.map(ClaimMap::from)
		.map_err(Error::invalid_token)
}
