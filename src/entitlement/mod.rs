//! Entitlement decision client.
//!
//! The decision endpoint answers whether licensed items are authorized for
//! the bearer of an access token, optionally consuming a license seat, and
//! releases consumed seats.
//!
//! A request names every item as a value-less query parameter:
//!
//! ```text
//! GET  {endpoint}{.jwt|.json|.txt}?item1&item2&doConsume=false[&hw=computer-id]
//! POST {endpoint}{.jwt|.json|.txt}?item1&doConsume=true[&hw=computer-id]
//! POST {endpoint}{.jwt|.json|.txt}?release&consumption-id1&consumption-id2
//! ```
//!
//! The response encoding is given by its `Content-Type`:
//!
//! - `application/jwt`: one signed token per item, joined with `&`;
//! - `application/json`: one JSON object, only for single-item requests;
//! - anything else: one `true`/`false` per item, joined with `&`.
use std::fmt;

use http::{HeaderValue, Method, header};
use iref::{Uri, UriBuf};
use serde_json::Value;

use crate::{
	AccessToken,
	config::OAuthConfig,
	error::Error,
	token::{ClaimMap, TokenVerifier, parse_bool},
	transport::{
		HttpClient, HttpRequest, NO_CACHE, NoContent, build_request, media_type,
	},
	util::keys_query,
};

/// Response encoding asked for through the endpoint path suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
	Jwt,
	Json,
	Text,

	/// Let the server pick.
	#[default]
	ServerDefault,
}

impl ResponseFormat {
	pub fn extension(self) -> &'static str {
		match self {
			Self::Jwt => ".jwt",
			Self::Json => ".json",
			Self::Text => ".txt",
			Self::ServerDefault => "",
		}
	}
}

/// Encoding a decision was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionEncoding {
	Jwt,
	Json,
	Text,
}

impl fmt::Display for DecisionEncoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Jwt => f.write_str("jwt"),
			Self::Json => f.write_str("json"),
			Self::Text => f.write_str("text"),
		}
	}
}

/// Decision of the server for one item (or one released consumption id).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationDecision {
	item: String,
	raw_response: String,
	segment: String,
	claims: ClaimMap,
	encoding: DecisionEncoding,
	verified: bool,
}

impl AuthorizationDecision {
	pub fn item(&self) -> &str {
		&self.item
	}

	/// Response body exactly as received, shared by every decision of a
	/// batched response.
	pub fn raw_response(&self) -> &str {
		&self.raw_response
	}

	/// Part of the response body this decision was decoded from.
	pub fn segment(&self) -> &str {
		&self.segment
	}

	pub fn claims(&self) -> &ClaimMap {
		&self.claims
	}

	pub fn encoding(&self) -> DecisionEncoding {
		self.encoding
	}

	/// `true` only for signed responses checked against a configured key.
	pub fn is_verified(&self) -> bool {
		self.verified
	}

	/// Value of the claim named after the item. Missing or non-boolean
	/// claims deny.
	pub fn is_authorized(&self) -> bool {
		self.claims.get_bool(&self.item).unwrap_or(false)
	}
}

/// Decodes a decision response for `items`, in order.
pub fn decode_decisions(
	items: &[&str],
	media_type: Option<&str>,
	body: &str,
	verifier: &TokenVerifier,
) -> Result<Vec<AuthorizationDecision>, Error> {
	let content = body.trim();
	if content.is_empty() {
		return Err(Error::invalid_response("empty decision response"));
	}

	let decision = |item: &str,
	                segment: &str,
	                claims: ClaimMap,
	                encoding: DecisionEncoding,
	                verified: bool| AuthorizationDecision {
		item: item.to_owned(),
		raw_response: body.to_owned(),
		segment: segment.to_owned(),
		claims,
		encoding,
		verified,
	};

	match media_type {
		Some("application/jwt") => split_segments(items, content)?
			.into_iter()
			.map(|(item, segment)| -> Result<_, Error> {
				let token = verifier.decode(segment)?;
				Ok(decision(
					item,
					segment,
					token.claims,
					DecisionEncoding::Jwt,
					token.verified,
				))
			})
			.collect(),
		Some("application/json") => {
			let [item] = items else {
				return Err(Error::invalid_response(
					"JSON decisions are only available for a single item",
				));
			};

			let claims = serde_json::from_str(content).map_err(Error::invalid_response)?;
			Ok(vec![decision(
				item,
				content,
				claims,
				DecisionEncoding::Json,
				false,
			)])
		}
		_ => split_segments(items, content)?
			.into_iter()
			.map(|(item, segment)| -> Result<_, Error> {
				let authorized = parse_bool(segment.trim()).ok_or_else(|| {
					Error::invalid_response(format!("`{segment}` is not a boolean decision"))
				})?;
				let mut claims = ClaimMap::new();
				claims.insert(item, Value::Bool(authorized));
				Ok(decision(
					item,
					segment,
					claims,
					DecisionEncoding::Text,
					false,
				))
			})
			.collect(),
	}
}

/// Pairs each item with its `&`-separated part of the body. A single item
/// takes the whole body.
fn split_segments<'i, 'b>(
	items: &[&'i str],
	content: &'b str,
) -> Result<Vec<(&'i str, &'b str)>, Error> {
	let segments: Vec<&str> = match items {
		[_] => vec![content],
		_ => content.split('&').collect(),
	};

	if segments.len() != items.len() {
		return Err(Error::invalid_response(format!(
			"expected {} decisions, received {}",
			items.len(),
			segments.len()
		)));
	}

	Ok(items.iter().copied().zip(segments).collect())
}

/// One request to the decision endpoint.
pub struct DecisionRequest<'a> {
	method: Method,
	uri: String,
	access_token: &'a AccessToken,
	items: &'a [&'a str],
	verifier: &'a TokenVerifier,
}

impl HttpRequest for DecisionRequest<'_> {
	type Response = Vec<AuthorizationDecision>;

	fn build_request(&self) -> Result<http::Request<Vec<u8>>, Error> {
		let mut request = build_request::<NoContent, _>(self.method.clone(), &self.uri, &())?;
		let headers = request.headers_mut();
		headers.insert(header::AUTHORIZATION, self.access_token.bearer_header()?);
		headers.insert(header::CACHE_CONTROL, NO_CACHE);
		headers.insert(header::PRAGMA, NO_CACHE);
		headers.insert(
			header::ACCEPT,
			HeaderValue::from_static("application/jwt, application/json, text/plain"),
		);
		Ok(request)
	}

	fn decode_response(
		&self,
		response: http::Response<Vec<u8>>,
	) -> Result<Vec<AuthorizationDecision>, Error> {
		if !response.status().is_success() {
			return Err(Error::server(response.status()));
		}

		let media_type = media_type(response.headers());
		log::debug!(
			"decision response for {} item(s) as {}",
			self.items.len(),
			media_type.as_deref().unwrap_or("unknown content type")
		);

		let body = std::str::from_utf8(response.body()).map_err(Error::invalid_response)?;
		decode_decisions(self.items, media_type.as_deref(), body, self.verifier)
	}
}

/// Client of the entitlement decision endpoint.
///
/// Cheap to clone when `H` is; the HTTP client is shared by every request.
#[derive(Debug, Clone)]
pub struct DecisionClient<H> {
	http_client: H,
	endpoint: UriBuf,
	verifier: TokenVerifier,
	computer_id: Option<String>,
}

impl<H: HttpClient> DecisionClient<H> {
	/// Decision tokens are decoded without verification until a verifier is
	/// set.
	pub fn new(http_client: H, endpoint: UriBuf) -> Self {
		Self {
			http_client,
			endpoint,
			verifier: TokenVerifier::default(),
			computer_id: None,
		}
	}

	/// Verifies decision tokens with the configured signing key.
	pub fn for_config(http_client: H, endpoint: UriBuf, config: &OAuthConfig) -> Self {
		Self::new(http_client, endpoint)
			.with_verifier(TokenVerifier::new(config.signing_key.clone()))
	}

	pub fn with_verifier(self, verifier: TokenVerifier) -> Self {
		Self { verifier, ..self }
	}

	/// Identifier of this device, sent as `hw`. Computing it is up to the
	/// host.
	pub fn with_computer_id(self, computer_id: impl Into<String>) -> Self {
		Self {
			computer_id: Some(computer_id.into()),
			..self
		}
	}

	pub fn endpoint(&self) -> &Uri {
		&self.endpoint
	}

	/// Asks whether `items` are authorized, consuming a seat for each when
	/// `consume` is set.
	pub async fn check_or_consume(
		&self,
		access_token: &AccessToken,
		items: &[&str],
		consume: bool,
		format: ResponseFormat,
	) -> Result<Vec<AuthorizationDecision>, Error> {
		check_items(items, format)?;

		let mut query = keys_query(items.iter().copied());
		query.push_str(if consume {
			"&doConsume=true"
		} else {
			"&doConsume=false"
		});
		if let Some(computer_id) = &self.computer_id {
			query.push_str("&hw=");
			query.extend(url::form_urlencoded::byte_serialize(computer_id.as_bytes()));
		}

		let method = if consume { Method::POST } else { Method::GET };
		self.send(method, format, &query, access_token, items).await
	}

	pub async fn check(
		&self,
		access_token: &AccessToken,
		items: &[&str],
		format: ResponseFormat,
	) -> Result<Vec<AuthorizationDecision>, Error> {
		self.check_or_consume(access_token, items, false, format)
			.await
	}

	pub async fn consume(
		&self,
		access_token: &AccessToken,
		items: &[&str],
		format: ResponseFormat,
	) -> Result<Vec<AuthorizationDecision>, Error> {
		self.check_or_consume(access_token, items, true, format)
			.await
	}

	/// Releases the license seats identified by `consumption_ids`.
	pub async fn release(
		&self,
		access_token: &AccessToken,
		consumption_ids: &[&str],
		format: ResponseFormat,
	) -> Result<Vec<AuthorizationDecision>, Error> {
		check_items(consumption_ids, format)?;

		let query = format!("release&{}", keys_query(consumption_ids.iter().copied()));
		self.send(Method::POST, format, &query, access_token, consumption_ids)
			.await
	}

	pub async fn release_one(
		&self,
		access_token: &AccessToken,
		consumption_id: &str,
		format: ResponseFormat,
	) -> Result<AuthorizationDecision, Error> {
		self.release(access_token, &[consumption_id], format)
			.await?
			.pop()
			.ok_or_else(|| Error::invalid_response("empty decision response"))
	}

	/// `{endpoint}{ext}?{query}`, keeping any query already on the endpoint.
	fn request_uri(&self, format: ResponseFormat, query: &str) -> String {
		let endpoint = self.endpoint.as_str();
		let (base, existing) = match endpoint.split_once('?') {
			Some((base, existing)) if !existing.is_empty() => (base, Some(existing)),
			Some((base, _)) => (base, None),
			None => (endpoint, None),
		};

		match existing {
			Some(existing) => format!("{base}{}?{existing}&{query}", format.extension()),
			None => format!("{base}{}?{query}", format.extension()),
		}
	}

	async fn send(
		&self,
		method: Method,
		format: ResponseFormat,
		query: &str,
		access_token: &AccessToken,
		items: &[&str],
	) -> Result<Vec<AuthorizationDecision>, Error> {
		DecisionRequest {
			method,
			uri: self.request_uri(format, query),
			access_token,
			items,
			verifier: &self.verifier,
		}
		.send(&self.http_client)
		.await
	}
}

fn check_items(items: &[&str], format: ResponseFormat) -> Result<(), Error> {
	if items.is_empty() {
		return Err(Error::invalid_state("no item given"));
	}

	if format == ResponseFormat::Json && items.len() > 1 {
		return Err(Error::invalid_response(
			"JSON decisions are only available for a single item",
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use http::StatusCode;
	use iref::uri;
	use serde_json::json;

	use super::*;
	use crate::{
		token::test_tokens::{hmac_key, sign, sign_with},
		transport::testing::ScriptedHttpClient,
	};

	fn token() -> &'static AccessToken {
		AccessToken::new("t").unwrap()
	}

	fn client(http: &ScriptedHttpClient) -> DecisionClient<&ScriptedHttpClient> {
		DecisionClient::new(http, uri!("https://ent.example.com/decision").to_owned())
			.with_verifier(TokenVerifier::new(Some(hmac_key())))
	}

	#[tokio::test]
	async fn text_check() {
		let http = ScriptedHttpClient::new().respond(StatusCode::OK, "text/plain", "true");

		let decisions = client(&http)
			.check(token(), &["X"], ResponseFormat::Text)
			.await
			.unwrap();

		assert_eq!(decisions.len(), 1);
		assert_eq!(decisions[0].item(), "X");
		assert!(decisions[0].is_authorized());
		assert_eq!(decisions[0].claims().get("X"), Some(&json!(true)));
		assert_eq!(decisions[0].encoding(), DecisionEncoding::Text);
		assert_eq!(decisions[0].raw_response(), "true");

		let requests = http.requests();
		let request = &requests[0];
		assert_eq!(request.method(), Method::GET);
		assert_eq!(
			request.uri(),
			"https://ent.example.com/decision.txt?X&doConsume=false"
		);
		assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer t");
		assert_eq!(request.headers()[header::CACHE_CONTROL], "no-cache");
		assert_eq!(request.headers()[header::PRAGMA], "no-cache");
	}

	#[tokio::test]
	async fn consume_sends_computer_id() {
		let http = ScriptedHttpClient::new().respond(StatusCode::OK, "text/plain", "true&false");

		let decisions = client(&http)
			.with_computer_id("host 42")
			.consume(token(), &["Pro Edition", "Addon"], ResponseFormat::ServerDefault)
			.await
			.unwrap();

		assert!(decisions[0].is_authorized());
		assert!(!decisions[1].is_authorized());
		assert_eq!(decisions[1].segment(), "false");
		assert_eq!(decisions[1].raw_response(), "true&false");

		let requests = http.requests();
		assert_eq!(requests[0].method(), Method::POST);
		assert_eq!(
			requests[0].uri(),
			"https://ent.example.com/decision?Pro+Edition&Addon&doConsume=true&hw=host+42"
		);
	}

	#[tokio::test]
	async fn json_single_item() {
		let http = ScriptedHttpClient::new().respond_json(json!({
			"X": true,
			"consumptionId": "c-1"
		}));

		let decisions = client(&http)
			.consume(token(), &["X"], ResponseFormat::Json)
			.await
			.unwrap();

		assert!(decisions[0].is_authorized());
		assert_eq!(decisions[0].claims().get_str("consumptionId"), Some("c-1"));
		assert_eq!(decisions[0].encoding(), DecisionEncoding::Json);
		assert!(!decisions[0].is_verified());
	}

	#[tokio::test]
	async fn json_format_rejects_batches() {
		let http = ScriptedHttpClient::new();
		let result = client(&http)
			.check(token(), &["X", "Y"], ResponseFormat::Json)
			.await;

		assert!(matches!(result, Err(Error::InvalidServerResponse(_))));
		assert_eq!(http.request_count(), 0);
	}

	#[tokio::test]
	async fn json_response_for_batch_is_invalid() {
		let http = ScriptedHttpClient::new().respond_json(json!({ "X": true, "Y": true }));
		let result = client(&http)
			.check(token(), &["X", "Y"], ResponseFormat::ServerDefault)
			.await;
		assert!(matches!(result, Err(Error::InvalidServerResponse(_))));
	}

	#[tokio::test]
	async fn empty_body_is_invalid() {
		for content_type in ["application/jwt", "application/json", "text/plain"] {
			let http = ScriptedHttpClient::new().respond(StatusCode::OK, content_type, "");
			let result = client(&http)
				.check(token(), &["X"], ResponseFormat::ServerDefault)
				.await;
			assert!(matches!(result, Err(Error::InvalidServerResponse(_))));
		}
	}

	#[tokio::test]
	async fn batched_jwt() {
		let body = format!(
			"{}&{}",
			sign(&json!({ "X": true, "consumptionId": "c-1" })),
			sign(&json!({ "Y": false }))
		);
		let http =
			ScriptedHttpClient::new().respond(StatusCode::OK, "application/jwt", body.clone());

		let decisions = client(&http)
			.consume(token(), &["X", "Y"], ResponseFormat::Jwt)
			.await
			.unwrap();

		assert_eq!(decisions.len(), 2);
		assert!(decisions[0].is_verified());
		assert!(decisions[0].is_authorized());
		assert_eq!(decisions[0].claims().get_str("consumptionId"), Some("c-1"));
		assert!(!decisions[1].is_authorized());
		assert_eq!(decisions[1].raw_response(), body);
		assert_eq!(
			http.requests()[0].uri(),
			"https://ent.example.com/decision.jwt?X&Y&doConsume=true"
		);
	}

	#[tokio::test]
	async fn jwt_count_mismatch() {
		let http = ScriptedHttpClient::new().respond(
			StatusCode::OK,
			"application/jwt",
			sign(&json!({ "X": true })),
		);
		let result = client(&http)
			.check(token(), &["X", "Y"], ResponseFormat::Jwt)
			.await;
		assert!(matches!(result, Err(Error::InvalidServerResponse(_))));
	}

	#[tokio::test]
	async fn forged_decision_token() {
		let http = ScriptedHttpClient::new().respond(
			StatusCode::OK,
			"application/jwt",
			sign_with(&json!({ "X": true }), "forged"),
		);
		let result = client(&http)
			.check(token(), &["X"], ResponseFormat::Jwt)
			.await;
		assert!(matches!(result, Err(Error::SignatureInvalid)));
	}

	#[tokio::test]
	async fn release_consumption_ids() {
		let http = ScriptedHttpClient::new().respond(StatusCode::OK, "text/plain", "true&true");

		let decisions = client(&http)
			.release(token(), &["c-1", "c-2"], ResponseFormat::Text)
			.await
			.unwrap();

		assert_eq!(decisions.len(), 2);
		assert_eq!(decisions[1].item(), "c-2");
		assert!(decisions[1].is_authorized());

		let requests = http.requests();
		assert_eq!(requests[0].method(), Method::POST);
		assert_eq!(
			requests[0].uri(),
			"https://ent.example.com/decision.txt?release&c-1&c-2"
		);
	}

	#[tokio::test]
	async fn release_one() {
		let http = ScriptedHttpClient::new().respond(StatusCode::OK, "text/plain", "true");
		let decision = client(&http)
			.release_one(token(), "c-1", ResponseFormat::ServerDefault)
			.await
			.unwrap();
		assert_eq!(decision.item(), "c-1");
		assert!(decision.is_authorized());
	}

	#[tokio::test]
	async fn unauthorized_status() {
		let http = ScriptedHttpClient::new().respond(StatusCode::UNAUTHORIZED, "text/plain", "");
		let result = client(&http)
			.check(token(), &["X"], ResponseFormat::Text)
			.await;
		assert!(matches!(
			result,
			Err(Error::ServerStatus(status)) if status == StatusCode::UNAUTHORIZED
		));
	}

	#[test]
	fn endpoint_query_is_kept() {
		let http = ScriptedHttpClient::new();
		let client = DecisionClient::new(
			&http,
			uri!("https://ent.example.com/decision?tenant=acme").to_owned(),
		);
		assert_eq!(
			client.request_uri(ResponseFormat::Json, "X&doConsume=false"),
			"https://ent.example.com/decision.json?tenant=acme&X&doConsume=false"
		);
	}

	#[test]
	fn text_decisions_must_be_booleans() {
		let verifier = TokenVerifier::default();
		let result = decode_decisions(&["X"], Some("text/plain"), "maybe", &verifier);
		assert!(matches!(result, Err(Error::InvalidServerResponse(_))));
	}

	#[test]
	fn unknown_content_type_is_text() {
		let verifier = TokenVerifier::default();
		let decisions = decode_decisions(&["X", "Y"], None, " false&TRUE \n", &verifier).unwrap();
		assert!(!decisions[0].is_authorized());
		assert!(decisions[1].is_authorized());
	}
}
