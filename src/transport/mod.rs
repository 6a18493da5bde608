//! HTTP transport layer, content type encoding, and client abstraction.
use http::{HeaderMap, HeaderValue, header};
use serde::Serialize;

use crate::error::Error;

mod client;

pub use client::*;

#[cfg(test)]
pub(crate) use client::testing;

/// `Content-Type: application/json` header value.
pub const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// `Content-Type: application/x-www-form-urlencoded` header value.
pub const APPLICATION_X_WWW_FORM_URLENCODED: HeaderValue =
	HeaderValue::from_static("application/x-www-form-urlencoded");

/// `Cache-Control: no-cache` header value.
pub const NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache");

/// Returns the media type of the response, lowercased and without
/// parameters (`application/json; charset=utf-8` gives `application/json`).
pub fn media_type(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
	let essence = value.split(';').next().unwrap_or_default().trim();
	Some(essence.to_ascii_lowercase())
}

/// Trait for encoding request bodies with a specific content type.
pub trait ContentType {
	/// The `Content-Type` header value, or `None` for requests with no body.
	const VALUE: Option<HeaderValue>;

	/// Serializes the given value into a byte vector using this content type's
	/// encoding.
	fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error>;
}

/// No request body. Used for requests that don't carry a payload.
pub struct NoContent;

impl ContentType for NoContent {
	const VALUE: Option<HeaderValue> = None;

	fn encode<T: Serialize>(_value: &T) -> Result<Vec<u8>, Error> {
		Ok(Vec::new())
	}
}

/// URL-encoded form (`application/x-www-form-urlencoded`) content type
/// encoding.
pub struct WwwFormUrlEncoded;

impl ContentType for WwwFormUrlEncoded {
	const VALUE: Option<HeaderValue> = Some(APPLICATION_X_WWW_FORM_URLENCODED);

	fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
		log::debug!("serializing {}", std::any::type_name_of_val(value));
		serde_html_form::to_string(value)
			.map(String::into_bytes)
			.map_err(Error::invalid_state)
	}
}

/// Builds a request carrying `body` encoded as `C`.
pub fn build_request<C: ContentType, T: Serialize>(
	method: http::Method,
	uri: &str,
	body: &T,
) -> Result<http::Request<Vec<u8>>, Error> {
	let mut builder = http::Request::builder().method(method).uri(uri);

	if let Some(content_type) = C::VALUE {
		builder = builder.header(header::CONTENT_TYPE, content_type);
	}

	builder
		.body(C::encode(body)?)
		.map_err(Error::configuration)
}

/// Trait implemented by every request this crate sends.
///
/// Mirrors the three steps of an exchange: build, send, decode.
pub trait HttpRequest {
	type Response;

	fn build_request(&self) -> Result<http::Request<Vec<u8>>, Error>;

	fn decode_response(&self, response: http::Response<Vec<u8>>) -> Result<Self::Response, Error>;

	#[allow(async_fn_in_trait)]
	async fn send(&self, http_client: &impl HttpClient) -> Result<Self::Response, Error> {
		let request = self.build_request()?;
		let response = http_client.send(request).await?;
		self.decode_response(response)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn media_type_strips_parameters() {
		let mut headers = HeaderMap::new();
		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("Application/JSON; charset=utf-8"),
		);
		assert_eq!(media_type(&headers).as_deref(), Some("application/json"));
		assert_eq!(media_type(&HeaderMap::new()), None);
	}

	#[test]
	fn form_request_has_content_type() {
		#[derive(Serialize)]
		struct Body<'a> {
			grant_type: &'a str,
		}

		let request = build_request::<WwwFormUrlEncoded, _>(
			http::Method::POST,
			"https://ent.example.com/token",
			&Body {
				grant_type: "authorization_code",
			},
		)
		.unwrap();

		assert_eq!(
			request.headers()[header::CONTENT_TYPE],
			APPLICATION_X_WWW_FORM_URLENCODED
		);
		assert_eq!(request.body(), b"grant_type=authorization_code");
	}
}
