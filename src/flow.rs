//! Authorization Code Grant flow.
//!
//! [`AuthorizationFlow`] drives one authorization attempt from start to end:
//!
//! 1. the authorization URI is built from the configuration and the
//!    per-attempt [`FlowArgs`];
//! 2. a [`RedirectCapture`] strategy shows it to the user and waits for the
//!    redirect, bounded by a timeout and a cancellation token;
//! 3. the response parameters are extracted from the redirect;
//! 4. the authorization code, if any, is exchanged at the token endpoint.
//!
//! Server-side failures (an `error` redirect, a token endpoint error, an
//! unreachable token endpoint) end the flow normally and are recorded in the
//! [`AuthorizationResult`]. Configuration errors, ID token verification
//! failures and capture failures are returned as errors.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1>
use std::time::Duration;

use iref::{Uri, UriBuf};
use tokio_util::sync::CancellationToken;

use crate::{
	CodeBuf, NonceBuf, StateBuf,
	capture::{CaptureOutcome, CaptureRequest, CapturedRedirect, RedirectCapture},
	config::OAuthConfig,
	endpoints::{AuthorizationCodeRequest, authorization_uri},
	error::Error,
	ext::pkce::{PkceCodeChallengeBuf, PkceCodeVerifierBuf, compute_challenge, generate_verifier},
	server::{AuthorizationErrorCode, ErrorResponse},
	token::AccessTokenResponse,
	transport::{HttpClient, HttpRequest},
	util::response_parameters,
};

/// Default bound on the wait for the redirect.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-attempt parameters of the authorization request.
///
/// A new value must be created for every attempt.
#[derive(Debug, Clone, Default)]
pub struct FlowArgs {
	pub state: Option<StateBuf>,
	pub nonce: Option<NonceBuf>,
	pub code_verifier: Option<PkceCodeVerifierBuf>,
}

impl FlowArgs {
	/// Random `state` and `nonce`, no PKCE verifier.
	pub fn new() -> Self {
		Self {
			state: Some(StateBuf::new_random()),
			nonce: Some(NonceBuf::new_random()),
			code_verifier: None,
		}
	}

	/// Random `state` and `nonce`, plus a fresh PKCE verifier when the
	/// configuration uses PKCE.
	pub fn for_config(config: &OAuthConfig) -> Self {
		Self {
			code_verifier: config.use_pkce.then(generate_verifier),
			..Self::new()
		}
	}

	/// `S256` challenge of the code verifier.
	pub fn code_challenge(&self) -> Result<PkceCodeChallengeBuf, Error> {
		self.code_verifier
			.as_deref()
			.map(compute_challenge)
			.ok_or_else(|| Error::invalid_state("no PKCE code verifier set"))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
	NotStarted,
	AwaitingRedirect,
	ResponseReceived,
	ExchangingToken,
	Completed,
	Cancelled,
	Failed,
}

impl FlowState {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
	}
}

/// Lifecycle notification, delivered synchronously to the listeners
/// registered with [`AuthorizationFlow::on_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
	Started,

	/// The authorization URI is about to be shown to the user.
	BeforeAuthorization { uri: UriBuf },

	/// Response parameters of the redirect, in order.
	AfterAuthorization { parameters: Vec<(String, String)> },

	Cancelled,

	Completed,

	Failed { error: String },
}

/// Outcome of a flow that received a redirect.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationResult {
	/// `state` returned by the server.
	pub state: Option<StateBuf>,

	pub error: Option<ErrorResponse>,

	pub access_token_response: Option<AccessTokenResponse>,
}

impl AuthorizationResult {
	pub fn is_success(&self) -> bool {
		self.error.is_none() && self.access_token_response.is_some()
	}

	/// Token response of a successful attempt, or the recorded error as
	/// [`Error::Protocol`].
	pub fn into_access_token_response(self) -> Result<AccessTokenResponse, Error> {
		match (self.error, self.access_token_response) {
			(None, Some(response)) => Ok(response),
			(Some(error), _) => Err(Error::protocol(error)),
			(None, None) => Err(Error::invalid_state("no token response received")),
		}
	}

	/// The recorded error as a standard authorization error code, if it is
	/// one.
	pub fn error_code(&self) -> Option<AuthorizationErrorCode> {
		AuthorizationErrorCode::from_code(&self.error.as_ref()?.error)
	}
}

/// Parameters of the authorization response.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2>
#[derive(Default)]
struct AuthorizationResponse {
	code: Option<String>,
	state: Option<String>,
	error: Option<String>,
	error_description: Option<String>,
	error_uri: Option<String>,
}

impl AuthorizationResponse {
	fn from_parameters(parameters: &[(String, String)]) -> Self {
		let mut response = Self::default();

		for (key, value) in parameters {
			let slot = match key.as_str() {
				"code" => &mut response.code,
				"state" => &mut response.state,
				"error" => &mut response.error,
				"error_description" => &mut response.error_description,
				"error_uri" => &mut response.error_uri,
				_ => continue,
			};

			if slot.is_none() && !value.is_empty() {
				*slot = Some(value.clone());
			}
		}

		response
	}

	fn error(&self) -> Option<ErrorResponse> {
		self.error.as_ref().map(|error| {
			ErrorResponse::new(
				error.clone(),
				self.error_description.clone(),
				self.error_uri.clone(),
			)
		})
	}
}

type Listener<'a> = Box<dyn Fn(&FlowEvent) + Send + Sync + 'a>;

fn emit(listeners: &[Listener<'_>], event: FlowEvent) {
	log::debug!("authorization flow event: {event:?}");
	for listener in listeners {
		listener(&event);
	}
}

/// One authorization attempt at a time, with a given capture strategy.
pub struct AuthorizationFlow<'a, H, C> {
	config: &'a OAuthConfig,
	http_client: H,
	capture: C,
	timeout: Duration,
	listeners: Vec<Listener<'a>>,
	state: FlowState,
	result: Option<AuthorizationResult>,
}

impl<'a, H, C> AuthorizationFlow<'a, H, C>
where
	H: HttpClient,
	C: RedirectCapture,
{
	pub fn new(config: &'a OAuthConfig, http_client: H, capture: C) -> Self {
		Self {
			config,
			http_client,
			capture,
			timeout: DEFAULT_TIMEOUT,
			listeners: Vec::new(),
			state: FlowState::NotStarted,
			result: None,
		}
	}

	pub fn with_timeout(self, timeout: Duration) -> Self {
		Self { timeout, ..self }
	}

	/// Registers a lifecycle listener.
	///
	/// Listeners may run on any thread of the runtime driving the flow.
	pub fn on_event(&mut self, listener: impl Fn(&FlowEvent) + Send + Sync + 'a) {
		self.listeners.push(Box::new(listener))
	}

	pub fn flow_state(&self) -> FlowState {
		self.state
	}

	/// Result of the last attempt that received a redirect.
	pub fn result(&self) -> Option<&AuthorizationResult> {
		self.result.as_ref()
	}

	pub fn into_result(self) -> Option<AuthorizationResult> {
		self.result
	}

	pub fn capture(&self) -> &C {
		&self.capture
	}

	/// Runs one authorization attempt.
	///
	/// Returns the `state` sent back by the server, or `None` if the attempt
	/// was cancelled, timed out, or the server did not return a `state`.
	pub async fn start(
		&mut self,
		args: FlowArgs,
		cancel: CancellationToken,
	) -> Result<Option<StateBuf>, Error> {
		self.result = None;
		self.state = FlowState::NotStarted;
		emit(&self.listeners, FlowEvent::Started);

		// Nothing is shown to the user before the configuration is known to
		// be complete.
		if let Err(e) = authorization_uri(self.config, &args, self.config.redirect_uri.as_deref()) {
			return Err(self.fail(e));
		}

		self.state = FlowState::AwaitingRedirect;
		let captured = match self.wait_for_redirect(&args, cancel).await {
			Ok(captured) => captured,
			Err(e) if e.is_cancellation() => return Ok(self.cancel()),
			Err(e) => return Err(self.fail(e)),
		};

		self.state = FlowState::ResponseReceived;
		let parameters = match response_parameters(
			&captured.uri,
			captured.redirect_uri.as_ref().map(|uri| uri.as_str()),
		) {
			Ok(parameters) => parameters,
			Err(e) => return Err(self.fail(e)),
		};

		emit(
			&self.listeners,
			FlowEvent::AfterAuthorization {
				parameters: parameters.clone(),
			},
		);

		let response = AuthorizationResponse::from_parameters(&parameters);
		let mut result = AuthorizationResult {
			state: response.state.clone().and_then(|s| StateBuf::new(s).ok()),
			error: response.error(),
			access_token_response: None,
		};

		if result.error.is_none() {
			if let Err(e) = self
				.complete(&args, response.code, captured.redirect_uri.as_deref(), &mut result)
				.await
			{
				self.result = Some(result);
				return Err(self.fail(e));
			}
		}

		let state = result.state.clone();
		match &result.error {
			Some(error) => {
				log::warn!("authorization failed: {}", error.error);
				self.state = FlowState::Failed;
				let error = error.error.clone();
				self.result = Some(result);
				emit(&self.listeners, FlowEvent::Failed { error });
			}
			None => {
				log::info!("authorization completed");
				self.state = FlowState::Completed;
				self.result = Some(result);
				emit(&self.listeners, FlowEvent::Completed);
			}
		}

		Ok(state)
	}

	async fn wait_for_redirect(
		&mut self,
		args: &FlowArgs,
		cancel: CancellationToken,
	) -> Result<CapturedRedirect, Error> {
		let config = self.config;
		let listeners = &self.listeners;
		let build = |redirect_uri: Option<&Uri>| -> Result<UriBuf, Error> {
			let uri = authorization_uri(config, args, redirect_uri)?;
			emit(listeners, FlowEvent::BeforeAuthorization { uri: uri.clone() });
			Ok(uri)
		};

		let request = CaptureRequest {
			redirect_uri: config.redirect_uri.as_deref(),
			authorization_uri: &build,
			cancel: cancel.child_token(),
		};

		tokio::select! {
			outcome = self.capture.capture(request) => match outcome? {
				CaptureOutcome::Redirected(captured) => Ok(captured),
				CaptureOutcome::Cancelled => Err(Error::cancelled()),
			},
			_ = tokio::time::sleep(self.timeout) => {
				log::warn!("no redirect received within {:?}", self.timeout);
				Err(Error::timeout())
			}
			_ = cancel.cancelled() => Err(Error::cancelled()),
		}
	}

	/// Validates the response and exchanges the code, recording server-side
	/// failures in `result`.
	///
	/// The code is consumed: it never outlives this call.
	async fn complete(
		&mut self,
		args: &FlowArgs,
		code: Option<String>,
		redirect_uri: Option<&Uri>,
		result: &mut AuthorizationResult,
	) -> Result<(), Error> {
		if let Some(expected) = &args.state {
			if result.state.as_ref() != Some(expected) {
				log::error!("authorization response `state` does not match the request");
				result.error = Some(ErrorResponse::described(
					ErrorResponse::INVALID_STATE,
					"the returned state does not match the one sent",
				));
				return Ok(());
			}
		}

		let Some(code) = code else {
			result.error = Some(ErrorResponse::described(
				"invalid_request",
				"the authorization response carries no code",
			));
			return Ok(());
		};

		let Ok(code) = CodeBuf::new(code) else {
			result.error = Some(ErrorResponse::described(
				"invalid_request",
				"the authorization code is malformed",
			));
			return Ok(());
		};

		self.state = FlowState::ExchangingToken;
		let request =
			AuthorizationCodeRequest::new(self.config, &code, args.code_verifier.as_deref())?
				.with_redirect_uri(redirect_uri);
		let body = match request.send(&self.http_client).await {
			Ok(body) => body,
			Err(e @ Error::Configuration(_)) => return Err(e),
			Err(e) => {
				result.error = Some(ErrorResponse::described(
					ErrorResponse::REQUEST_FAILED,
					e.to_string(),
				));
				return Ok(());
			}
		};
		drop(code);

		let response = match AccessTokenResponse::decode(&body) {
			Ok(response) => response.with_verifier(self.config.token_verifier()),
			Err(e) => {
				result.error = Some(ErrorResponse::described(
					ErrorResponse::REQUEST_FAILED,
					e.to_string(),
				));
				return Ok(());
			}
		};

		if let Some(error) = response.error_response() {
			result.error = Some(error);
			return Ok(());
		}

		if response.access_token().is_none() {
			log::error!("token response carries neither a token nor an error");
			result.error = Some(ErrorResponse::described(
				ErrorResponse::REQUEST_FAILED,
				"token response carries no access_token",
			));
			return Ok(());
		}

		if let Some(id_token) = response.id_token()? {
			if let Some(nonce) = &args.nonce {
				if !id_token.matches_nonce(nonce) {
					log::error!("ID token `nonce` does not match the request");
					result.error = Some(ErrorResponse::described(
						ErrorResponse::INVALID_NONCE,
						"the ID token nonce does not match the one sent",
					));
					return Ok(());
				}
			}
		}

		result.access_token_response = Some(response);
		Ok(())
	}

	fn cancel(&mut self) -> Option<StateBuf> {
		self.state = FlowState::Cancelled;
		emit(&self.listeners, FlowEvent::Cancelled);
		None
	}

	fn fail(&mut self, error: Error) -> Error {
		self.state = FlowState::Failed;
		emit(
			&self.listeners,
			FlowEvent::Failed {
				error: error.to_string(),
			},
		);
		error
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	};

	use http::StatusCode;
	use iref::uri;
	use serde_json::json;

	use super::*;
	use crate::{
		ClientIdBuf,
		capture::{DelegateCapture, RedirectSink},
		token::test_tokens::{hmac_key, sign, sign_with},
		transport::testing::{ScriptedHttpClient, body_str},
		util::{parse_query, query_of},
	};

	/// Counts releases of the capture resource.
	struct Resource(Arc<AtomicUsize>);

	impl Drop for Resource {
		fn drop(&mut self) {
			self.0.fetch_add(1, Ordering::SeqCst);
		}
	}

	enum Script {
		/// Builds the callback from the authorization URI parameters.
		Redirect(Box<dyn Fn(&[(String, String)]) -> String>),
		Cancel,
		Hang,
	}

	struct FakeCapture {
		script: Script,
		invoked: usize,
		released: Arc<AtomicUsize>,
	}

	impl FakeCapture {
		fn new(script: Script) -> Self {
			Self {
				script,
				invoked: 0,
				released: Arc::new(AtomicUsize::new(0)),
			}
		}

		fn redirect(build: impl Fn(&[(String, String)]) -> String + 'static) -> Self {
			Self::new(Script::Redirect(Box::new(build)))
		}
	}

	impl RedirectCapture for FakeCapture {
		async fn capture(&mut self, request: CaptureRequest<'_>) -> Result<CaptureOutcome, Error> {
			self.invoked += 1;
			let _resource = Resource(self.released.clone());
			let start_uri = (request.authorization_uri)(request.redirect_uri)?;
			let parameters = parse_query(query_of(start_uri.as_str()))?;

			match &self.script {
				Script::Redirect(build) => Ok(CaptureOutcome::Redirected(CapturedRedirect {
					uri: build(&parameters),
					redirect_uri: request.redirect_uri.map(ToOwned::to_owned),
				})),
				Script::Cancel => Ok(CaptureOutcome::Cancelled),
				Script::Hang => std::future::pending().await,
			}
		}
	}

	fn param<'p>(parameters: &'p [(String, String)], key: &str) -> &'p str {
		parameters
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
			.unwrap()
	}

	fn encode(value: &str) -> String {
		url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
	}

	/// Echoes `state` with code `xyz`.
	fn echo_state(parameters: &[(String, String)]) -> String {
		format!(
			"http://localhost/cb?code=xyz&state={}",
			encode(param(parameters, "state"))
		)
	}

	fn config() -> OAuthConfig {
		OAuthConfig::new(ClientIdBuf::new("abc".to_owned()).unwrap())
			.with_authorization_endpoint(uri!("https://ent.example.com/authz").to_owned())
			.with_token_endpoint(uri!("https://ent.example.com/token").to_owned())
			.with_redirect_uri(uri!("http://localhost/cb").to_owned())
			.with_signing_key(hmac_key())
	}

	fn record_events<H: HttpClient, C: RedirectCapture>(
		flow: &mut AuthorizationFlow<'_, H, C>,
	) -> Arc<Mutex<Vec<FlowEvent>>> {
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = events.clone();
		flow.on_event(move |event| sink.lock().unwrap().push(event.clone()));
		events
	}

	#[tokio::test]
	async fn completes_with_tokens() {
		let config = config();
		let args = FlowArgs::for_config(&config);
		let sent_state = args.state.clone();
		let nonce = args.nonce.clone().unwrap();

		let id_token = sign(&json!({ "sub": "user-1", "aud": "abc", "nonce": nonce.as_str() }));
		let http = ScriptedHttpClient::new().respond_json(json!({
			"access_token": "t",
			"token_type": "Bearer",
			"expires_in": 3600,
			"id_token": id_token,
		}));

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		let events = record_events(&mut flow);

		let state = flow.start(args, CancellationToken::new()).await.unwrap();
		assert_eq!(state, sent_state);
		assert_eq!(flow.flow_state(), FlowState::Completed);

		let result = flow.result().unwrap();
		assert!(result.is_success());
		let response = result.access_token_response.as_ref().unwrap();
		assert_eq!(response.access_token().unwrap().as_str(), "t");
		assert_eq!(
			response.id_token().unwrap().unwrap().subject(),
			Some("user-1")
		);

		let body = body_str(&http.requests()[0]).to_owned();
		assert!(body.starts_with("grant_type=authorization_code&code=xyz&client_id=abc"));
		assert!(body.contains("code_verifier="));

		let events = events.lock().unwrap();
		assert_eq!(events.len(), 4);
		assert_eq!(events[0], FlowEvent::Started);
		assert!(matches!(
			&events[1],
			FlowEvent::BeforeAuthorization { uri }
				if uri.as_str().starts_with("https://ent.example.com/authz?")
		));
		assert!(matches!(
			&events[2],
			FlowEvent::AfterAuthorization { parameters }
				if parameters[0] == ("code".to_owned(), "xyz".to_owned())
		));
		assert_eq!(events[3], FlowEvent::Completed);
	}

	#[tokio::test]
	async fn cancellation_skips_token_exchange() {
		let config = config();
		let http = ScriptedHttpClient::new();
		let capture = FakeCapture::new(Script::Cancel);
		let released = capture.released.clone();

		let mut flow = AuthorizationFlow::new(&config, &http, capture);
		let events = record_events(&mut flow);

		let state = flow
			.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(state, None);
		assert_eq!(flow.flow_state(), FlowState::Cancelled);
		assert!(flow.result().is_none());
		assert_eq!(http.request_count(), 0);
		assert_eq!(released.load(Ordering::SeqCst), 1);
		assert_eq!(events.lock().unwrap().last(), Some(&FlowEvent::Cancelled));
	}

	#[tokio::test]
	async fn timeout_cancels() {
		let config = config();
		let http = ScriptedHttpClient::new();
		let capture = FakeCapture::new(Script::Hang);
		let released = capture.released.clone();

		let mut flow = AuthorizationFlow::new(&config, &http, capture)
			.with_timeout(Duration::from_millis(50));

		let state = flow
			.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(state, None);
		assert_eq!(flow.flow_state(), FlowState::Cancelled);
		assert_eq!(released.load(Ordering::SeqCst), 1);
		assert_eq!(http.request_count(), 0);
	}

	#[tokio::test]
	async fn external_cancellation() {
		let config = config();
		let http = ScriptedHttpClient::new();
		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::new(Script::Hang));

		let cancel = CancellationToken::new();
		let trigger = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			trigger.cancel();
		});

		let state = flow.start(FlowArgs::for_config(&config), cancel).await.unwrap();
		assert_eq!(state, None);
		assert_eq!(flow.flow_state(), FlowState::Cancelled);
	}

	#[tokio::test]
	async fn exchange_failure_keeps_state() {
		let config = config();
		let args = FlowArgs::for_config(&config);
		let sent_state = args.state.clone();
		let http = ScriptedHttpClient::new().fail("connection refused");

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		let events = record_events(&mut flow);
		let state = flow.start(args, CancellationToken::new()).await.unwrap();

		assert_eq!(state, sent_state);
		assert_eq!(flow.flow_state(), FlowState::Failed);

		let result = flow.result().unwrap();
		assert_eq!(result.state, sent_state);
		assert!(result.access_token_response.is_none());
		assert_eq!(
			result.error.as_ref().unwrap().error,
			ErrorResponse::REQUEST_FAILED
		);
		assert_eq!(
			events.lock().unwrap().last(),
			Some(&FlowEvent::Failed {
				error: ErrorResponse::REQUEST_FAILED.to_owned()
			})
		);
	}

	#[tokio::test]
	async fn token_endpoint_error_is_recorded() {
		let config = config();
		let args = FlowArgs::for_config(&config);
		let sent_state = args.state.clone();
		let http = ScriptedHttpClient::new().respond(
			StatusCode::BAD_REQUEST,
			"application/json",
			r#"{"error":"invalid_grant","error_description":"code expired"}"#,
		);

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		let state = flow.start(args, CancellationToken::new()).await.unwrap();

		assert_eq!(state, sent_state);
		let result = flow.result().unwrap();
		assert!(!result.is_success());
		assert_eq!(result.error.as_ref().unwrap().error, "invalid_grant");
		assert_eq!(
			result.error.as_ref().unwrap().error_description.as_deref(),
			Some("code expired")
		);
	}

	#[tokio::test]
	async fn state_mismatch_skips_exchange() {
		let config = config();
		let http = ScriptedHttpClient::new();
		let capture =
			FakeCapture::redirect(|_| "http://localhost/cb?code=xyz&state=forged".to_owned());

		let mut flow = AuthorizationFlow::new(&config, &http, capture);
		let state = flow
			.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(state.as_ref().map(|s| s.as_str()), Some("forged"));
		assert_eq!(
			flow.result().unwrap().error.as_ref().unwrap().error,
			ErrorResponse::INVALID_STATE
		);
		assert_eq!(http.request_count(), 0);
	}

	#[tokio::test]
	async fn server_error_redirect() {
		let config = config();
		let http = ScriptedHttpClient::new();
		let capture = FakeCapture::redirect(|parameters| {
			format!(
				"http://localhost/cb?error=access_denied&error_description=User+declined&state={}",
				encode(param(parameters, "state"))
			)
		});

		let mut flow = AuthorizationFlow::new(&config, &http, capture);
		flow.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		let error = flow.result().unwrap().error.clone().unwrap();
		assert_eq!(error.error, "access_denied");
		assert_eq!(error.error_description.as_deref(), Some("User declined"));
		assert_eq!(
			flow.result().unwrap().error_code(),
			Some(AuthorizationErrorCode::AccessDenied)
		);
		assert_eq!(flow.flow_state(), FlowState::Failed);
		assert_eq!(http.request_count(), 0);
	}

	#[tokio::test]
	async fn redirect_uri_parameters_are_stripped() {
		let config =
			config().with_redirect_uri(uri!("http://localhost/cb?app=desktop").to_owned());
		let http = ScriptedHttpClient::new().respond_json(json!({ "access_token": "t" }));
		let capture = FakeCapture::redirect(|parameters| {
			format!(
				"http://localhost/cb?app=desktop&code=xyz&state={}",
				encode(param(parameters, "state"))
			)
		});

		let mut flow = AuthorizationFlow::new(&config, &http, capture);
		let events = record_events(&mut flow);
		flow.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		let events = events.lock().unwrap();
		let FlowEvent::AfterAuthorization { parameters } = &events[2] else {
			panic!("unexpected event {:?}", events[2]);
		};
		assert!(parameters.iter().all(|(key, _)| key != "app"));
		assert!(flow.result().unwrap().is_success());
	}

	#[tokio::test]
	async fn missing_configuration_fails_before_capture() {
		let config = OAuthConfig::default()
			.with_authorization_endpoint(uri!("https://ent.example.com/authz").to_owned());
		let http = ScriptedHttpClient::new();
		let capture = FakeCapture::new(Script::Cancel);
		let released = capture.released.clone();

		let mut flow = AuthorizationFlow::new(&config, &http, capture);
		let result = flow.start(FlowArgs::new(), CancellationToken::new()).await;

		assert!(matches!(result, Err(Error::Configuration(_))));
		assert_eq!(flow.flow_state(), FlowState::Failed);
		assert_eq!(flow.capture().invoked, 0);
		assert_eq!(released.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn forged_id_token_fails() {
		let config = config();
		let args = FlowArgs::for_config(&config);
		let id_token = sign_with(&json!({ "sub": "user-1" }), "forged");
		let http = ScriptedHttpClient::new()
			.respond_json(json!({ "access_token": "t", "id_token": id_token }));

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		let result = flow.start(args, CancellationToken::new()).await;

		assert!(matches!(result, Err(Error::SignatureInvalid)));
		assert_eq!(flow.flow_state(), FlowState::Failed);
		assert!(flow.result().unwrap().access_token_response.is_none());
	}

	#[tokio::test]
	async fn nonce_mismatch_is_recorded() {
		let config = config();
		let id_token = sign(&json!({ "sub": "user-1", "nonce": "replayed" }));
		let http = ScriptedHttpClient::new()
			.respond_json(json!({ "access_token": "t", "id_token": id_token }));

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		flow.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		let result = flow.result().unwrap();
		assert!(result.access_token_response.is_none());
		assert_eq!(
			result.error.as_ref().unwrap().error,
			ErrorResponse::INVALID_NONCE
		);
	}

	#[tokio::test]
	async fn missing_access_token_is_recorded() {
		let config = config();
		let args = FlowArgs::for_config(&config);
		let sent_state = args.state.clone();
		let http = ScriptedHttpClient::new().respond_json(json!({}));

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		let state = flow.start(args, CancellationToken::new()).await.unwrap();

		assert_eq!(state, sent_state);
		assert_eq!(flow.flow_state(), FlowState::Failed);

		let result = flow.into_result().unwrap();
		assert!(!result.is_success());
		assert!(result.access_token_response.is_none());
		assert_eq!(
			result.error.as_ref().unwrap().error,
			ErrorResponse::REQUEST_FAILED
		);
		assert!(matches!(
			result.into_access_token_response(),
			Err(Error::Protocol(error)) if error.error == ErrorResponse::REQUEST_FAILED
		));
	}

	#[tokio::test]
	async fn successful_result_yields_token_response() {
		let config = config();
		let http = ScriptedHttpClient::new().respond_json(json!({ "access_token": "t" }));

		let mut flow = AuthorizationFlow::new(&config, &http, FakeCapture::redirect(echo_state));
		flow.start(FlowArgs::for_config(&config), CancellationToken::new())
			.await
			.unwrap();

		let response = flow
			.into_result()
			.unwrap()
			.into_access_token_response()
			.unwrap();
		assert_eq!(response.access_token().unwrap().as_str(), "t");
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn flow_runs_on_spawned_task() {
		let config = config();

		let state = tokio::spawn(async move {
			let http = ScriptedHttpClient::new();
			let capture = DelegateCapture::new(|_: &Uri, sink: RedirectSink| -> Result<(), Error> {
				sink.cancel();
				Ok(())
			});

			let mut flow = AuthorizationFlow::new(&config, &http, capture);
			let events = record_events(&mut flow);
			let state = flow.start(FlowArgs::for_config(&config), CancellationToken::new()).await;

			assert_eq!(flow.flow_state(), FlowState::Cancelled);
			assert_eq!(events.lock().unwrap().last(), Some(&FlowEvent::Cancelled));
			state
		})
		.await
		.unwrap()
		.unwrap();

		assert_eq!(state, None);
	}

	#[test]
	fn code_challenge_requires_verifier() {
		assert!(matches!(
			FlowArgs::new().code_challenge(),
			Err(Error::InvalidState(_))
		));

		let config = OAuthConfig::default();
		let challenge = FlowArgs::for_config(&config).code_challenge().unwrap();
		assert_eq!(challenge.as_str().len(), 43);
		assert!(FlowArgs::for_config(&config.with_pkce(false)).code_verifier.is_none());
	}
}
