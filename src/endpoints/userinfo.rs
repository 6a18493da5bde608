//! OpenID Connect UserInfo request.
//!
//! See: <https://openid.net/specs/openid-connect-core-1_0.html#UserInfo>
use http::header;
use iref::Uri;

use crate::{
	AccessToken,
	config::OAuthConfig,
	error::Error,
	token::ClaimMap,
	transport::{APPLICATION_JSON, HttpClient, HttpRequest, NoContent, build_request},
};

pub struct UserInfoRequest<'a> {
	endpoint: &'a Uri,
	access_token: &'a AccessToken,
}

impl<'a> UserInfoRequest<'a> {
	pub fn new(config: &'a OAuthConfig, access_token: &'a AccessToken) -> Result<Self, Error> {
		Ok(Self {
			endpoint: config.require_userinfo_endpoint()?,
			access_token,
		})
	}
}

impl HttpRequest for UserInfoRequest<'_> {
	type Response = ClaimMap;

	fn build_request(&self) -> Result<http::Request<Vec<u8>>, Error> {
		let mut request =
			build_request::<NoContent, _>(http::Method::GET, self.endpoint.as_str(), &())?;
		let headers = request.headers_mut();
		headers.insert(header::AUTHORIZATION, self.access_token.bearer_header()?);
		headers.insert(header::ACCEPT, APPLICATION_JSON);
		Ok(request)
	}

	fn decode_response(&self, response: http::Response<Vec<u8>>) -> Result<ClaimMap, Error> {
		if !response.status().is_success() {
			return Err(Error::server(response.status()));
		}

		serde_json::from_slice(response.body()).map_err(Error::invalid_response)
	}
}

/// Fetches the claims about the authenticated user.
pub async fn fetch_user_info(
	http_client: &impl HttpClient,
	config: &OAuthConfig,
	access_token: &AccessToken,
) -> Result<ClaimMap, Error> {
	UserInfoRequest::new(config, access_token)?
		.send(http_client)
		.await
}
