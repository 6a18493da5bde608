use iref::{Uri, UriBuf};
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
	config::OAuthConfig,
	error::Error,
	ext::pkce::{PkceCodeChallengeBuf, PkceCodeChallengeMethod},
	flow::FlowArgs,
	util::extend_uri_query,
};

/// The only `response_type` this client asks for.
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Query parameters of an authorization request.
///
/// Parameters are serialized in declaration order.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.1>
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest<'a> {
	pub response_type: &'a str,

	pub client_id: &'a str,

	/// Asks the hosted login page to offer a "remember me" option.
	#[serde(rename = "showRememberMe")]
	pub show_remember_me: bool,

	pub redirect_uri: Option<&'a str>,

	pub scope: Option<&'a str>,

	pub state: Option<&'a str>,

	pub nonce: Option<&'a str>,

	pub code_challenge_method: Option<PkceCodeChallengeMethod>,

	pub code_challenge: Option<&'a str>,
}

impl<'a> AuthorizationRequest<'a> {
	/// Collects the request parameters from `config` and `args`.
	///
	/// `code_challenge` must be given when `config.use_pkce` is set.
	pub fn new(
		config: &'a OAuthConfig,
		args: &'a FlowArgs,
		redirect_uri: Option<&'a Uri>,
		code_challenge: Option<&'a PkceCodeChallengeBuf>,
	) -> Result<Self, Error> {
		let client_id = config.require_client_id()?;

		Ok(Self {
			response_type: RESPONSE_TYPE_CODE,
			client_id: client_id.as_str(),
			show_remember_me: config.show_remember_me,
			redirect_uri: redirect_uri.map(Uri::as_str),
			scope: config.scope.as_ref().map(|scope| scope.as_str()),
			state: args.state.as_ref().map(|state| state.as_str()),
			nonce: args.nonce.as_ref().map(|nonce| nonce.as_str()),
			code_challenge_method: code_challenge.map(|_| PkceCodeChallengeMethod::S256),
			code_challenge: code_challenge.map(|challenge| challenge.as_str()),
		})
	}
}

/// Builds the URI the user agent is sent to.
///
/// Query parameters already present on the configured authorization endpoint
/// are kept. `redirect_uri` is the address the capture strategy listens on,
/// usually `config.redirect_uri`.
pub fn authorization_uri(
	config: &OAuthConfig,
	args: &FlowArgs,
	redirect_uri: Option<&Uri>,
) -> Result<UriBuf, Error> {
	config.require_client_id()?;
	let endpoint = config.require_authorization_endpoint()?;

	let code_challenge = if config.use_pkce {
		Some(args.code_challenge()?)
	} else {
		None
	};

	let request = AuthorizationRequest::new(config, args, redirect_uri, code_challenge.as_ref())?;

	let mut uri = endpoint.to_owned();
	extend_uri_query(&mut uri, &request)?;
	log::debug!("authorization URI built for client `{}`", request.client_id);
	Ok(uri)
}
