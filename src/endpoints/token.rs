//! Token endpoint requests.
//!
//! Both requests return the raw response body, whatever the status code, so
//! that an OAuth error payload reaches the caller. Only transport failures are
//! errors.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.3>
use http::header;
use iref::Uri;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
	Code, Scope,
	config::OAuthConfig,
	error::Error,
	ext::pkce::PkceCodeVerifier,
	transport::{APPLICATION_JSON, HttpClient, HttpRequest, WwwFormUrlEncoded, build_request},
};

#[skip_serializing_none]
#[derive(Serialize)]
struct AuthorizationCodeForm<'a> {
	grant_type: &'static str,
	code: &'a str,
	client_id: &'a str,
	redirect_uri: Option<&'a str>,
	client_secret: Option<&'a str>,
	code_verifier: Option<&'a str>,
}

#[skip_serializing_none]
#[derive(Serialize)]
struct RefreshTokenForm<'a> {
	grant_type: &'static str,
	refresh_token: &'a str,
	client_id: &'a str,
	client_secret: Option<&'a str>,
	scope: Option<&'a str>,
}

/// Exchange of an authorization code for an access token.
pub struct AuthorizationCodeRequest<'a> {
	config: &'a OAuthConfig,
	endpoint: &'a Uri,
	code: &'a Code,
	code_verifier: Option<&'a PkceCodeVerifier>,
	redirect_uri: Option<&'a Uri>,
}

impl<'a> AuthorizationCodeRequest<'a> {
	/// Prepares the exchange. The redirect URI defaults to the configured
	/// one.
	pub fn new(
		config: &'a OAuthConfig,
		code: &'a Code,
		code_verifier: Option<&'a PkceCodeVerifier>,
	) -> Result<Self, Error> {
		Ok(Self {
			config,
			endpoint: config.require_token_endpoint()?,
			code,
			code_verifier,
			redirect_uri: config.redirect_uri.as_deref(),
		})
	}

	/// Overrides the redirect URI, which must be the one sent in the
	/// authorization request.
	pub fn with_redirect_uri(self, redirect_uri: Option<&'a Uri>) -> Self {
		Self {
			redirect_uri,
			..self
		}
	}
}

impl HttpRequest for AuthorizationCodeRequest<'_> {
	type Response = String;

	fn build_request(&self) -> Result<http::Request<Vec<u8>>, Error> {
		let (client_secret, code_verifier) = if self.config.use_pkce {
			let code_verifier = self.code_verifier.ok_or_else(|| {
				Error::invalid_state("PKCE is enabled but no code verifier is set")
			})?;
			(None, Some(code_verifier.as_str()))
		} else {
			let client_secret = self.config.client_secret.as_ref().map(|s| s.expose());
			(client_secret, None)
		};

		let form = AuthorizationCodeForm {
			grant_type: "authorization_code",
			code: self.code.as_str(),
			client_id: self.config.require_client_id()?.as_str(),
			redirect_uri: self.redirect_uri.map(Uri::as_str),
			client_secret,
			code_verifier,
		};

		token_request(self.endpoint, &form)
	}

	fn decode_response(&self, response: http::Response<Vec<u8>>) -> Result<String, Error> {
		response_body(response)
	}
}

/// Exchange of a refresh token for a new access token.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-6>
pub struct RefreshTokenRequest<'a> {
	config: &'a OAuthConfig,
	endpoint: &'a Uri,
	refresh_token: &'a str,
	scope: Option<&'a Scope>,
}

impl<'a> RefreshTokenRequest<'a> {
	pub fn new(
		config: &'a OAuthConfig,
		refresh_token: &'a str,
		scope: Option<&'a Scope>,
	) -> Result<Self, Error> {
		Ok(Self {
			config,
			endpoint: config.require_token_endpoint()?,
			refresh_token,
			scope,
		})
	}
}

impl HttpRequest for RefreshTokenRequest<'_> {
	type Response = String;

	fn build_request(&self) -> Result<http::Request<Vec<u8>>, Error> {
		let client_secret = if self.config.use_pkce {
			None
		} else {
			self.config.client_secret.as_ref().map(|s| s.expose())
		};

		let form = RefreshTokenForm {
			grant_type: "refresh_token",
			refresh_token: self.refresh_token,
			client_id: self.config.require_client_id()?.as_str(),
			client_secret,
			scope: self.scope.map(Scope::as_str),
		};

		token_request(self.endpoint, &form)
	}

	fn decode_response(&self, response: http::Response<Vec<u8>>) -> Result<String, Error> {
		response_body(response)
	}
}

fn token_request<T: Serialize>(endpoint: &Uri, form: &T) -> Result<http::Request<Vec<u8>>, Error> {
	let mut request =
		build_request::<WwwFormUrlEncoded, _>(http::Method::POST, endpoint.as_str(), form)?;
	request
		.headers_mut()
		.insert(header::ACCEPT, APPLICATION_JSON);
	Ok(request)
}

fn response_body(response: http::Response<Vec<u8>>) -> Result<String, Error> {
	let status = response.status();
	if status.is_success() {
		log::debug!("token endpoint responded with {status}");
	} else {
		log::warn!("token endpoint responded with {status}");
	}

	String::from_utf8(response.into_body()).map_err(Error::invalid_response)
}

/// Exchanges `code` at the token endpoint and returns the raw JSON body.
///
/// The client secret is sent only without PKCE, the code verifier only with
/// it.
pub async fn request_access_token(
	http_client: &impl HttpClient,
	config: &OAuthConfig,
	code: &Code,
	code_verifier: Option<&PkceCodeVerifier>,
) -> Result<String, Error> {
	AuthorizationCodeRequest::new(config, code, code_verifier)?
		.send(http_client)
		.await
}

/// Exchanges `refresh_token` at the token endpoint and returns the raw JSON
/// body.
pub async fn refresh_access_token(
	http_client: &impl HttpClient,
	config: &OAuthConfig,
	refresh_token: &str,
	scope: Option<&Scope>,
) -> Result<String, Error> {
	RefreshTokenRequest::new(config, refresh_token, scope)?
		.send(http_client)
		.await
}
