//! Loopback HTTP listener.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc8252#section-7.3>
use std::{
	future::IntoFuture,
	net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
	ops::RangeInclusive,
	sync::Arc,
	time::Duration,
};

use axum::{
	Router,
	extract::State,
	http::{HeaderValue, StatusCode, Uri as RequestUri, header},
	response::{IntoResponse, Response},
};
use iref::{Uri, UriBuf};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

use super::{CaptureOutcome, CaptureRequest, CapturedRedirect, RedirectCapture, is_redirect_to};

/// Ports probed, in order, when the redirect URI does not fix one.
pub const DEFAULT_PORTS: RangeInclusive<u16> = 49152..=49251;

/// How long the listener is kept alive after the redirect so the response
/// page reaches the browser.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const DEFAULT_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>Sign-in complete</title></head>\
<body><p>Sign-in complete. \
You can close this window and return to the application.</p></body></html>";

/// Opens the authorization URI in a user agent.
pub trait UriOpener {
	fn open(&self, uri: &Uri) -> Result<(), Error>;
}

impl<F> UriOpener for F
where
	F: Fn(&Uri) -> Result<(), Error>,
{
	fn open(&self, uri: &Uri) -> Result<(), Error> {
		self(uri)
	}
}

/// Opens URIs with the platform URL handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl UriOpener for SystemBrowser {
	fn open(&self, uri: &Uri) -> Result<(), Error> {
		log::info!("opening authorization URI in the system browser");

		#[cfg(target_os = "macos")]
		let mut command = std::process::Command::new("open");

		#[cfg(target_os = "windows")]
		let mut command = {
			let mut command = std::process::Command::new("cmd");
			// `start` takes the window title as first argument.
			command.args(["/C", "start", ""]);
			command
		};

		#[cfg(not(any(target_os = "macos", target_os = "windows")))]
		let mut command = std::process::Command::new("xdg-open");

		command
			.arg(uri.as_str())
			.spawn()
			.map(drop)
			.map_err(|e| Error::configuration(format!("unable to open the browser: {e}")))
	}
}

/// Page served to the browser once the redirect is received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePage {
	pub content_type: String,
	pub body: String,
}

impl ResponsePage {
	pub fn html(body: impl Into<String>) -> Self {
		Self {
			content_type: "text/html; charset=utf-8".to_owned(),
			body: body.into(),
		}
	}

	pub fn text(body: impl Into<String>) -> Self {
		Self {
			content_type: "text/plain; charset=utf-8".to_owned(),
			body: body.into(),
		}
	}
}

impl Default for ResponsePage {
	fn default() -> Self {
		Self::html(DEFAULT_PAGE)
	}
}

impl IntoResponse for &ResponsePage {
	fn into_response(self) -> Response {
		let content_type = HeaderValue::from_str(&self.content_type)
			.unwrap_or_else(|_| HeaderValue::from_static("text/plain"));
		(
			[
				(header::CONTENT_TYPE, content_type),
				(header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
			],
			self.body.clone(),
		)
			.into_response()
	}
}

/// Receives the redirect on a loopback interface.
///
/// The redirect URI host picks the interface: an IPv4 loopback address,
/// `[::1]`, or `localhost`, which binds `127.0.0.1` and falls back to `::1`.
/// Any other host is a configuration error.
///
/// The port comes from the configured redirect URI when it has one.
/// Otherwise ports are probed in order from [`DEFAULT_PORTS`] (or the range
/// set with [`Self::with_ports`]) and the first free one is substituted in
/// the redirect URI, which defaults to `http://127.0.0.1/`.
pub struct LoopbackCapture<O = SystemBrowser> {
	ports: RangeInclusive<u16>,
	page: ResponsePage,
	opener: O,
}

impl Default for LoopbackCapture {
	fn default() -> Self {
		Self::new()
	}
}

impl LoopbackCapture {
	pub fn new() -> Self {
		Self::with_opener(SystemBrowser)
	}
}

impl<O> LoopbackCapture<O> {
	pub fn with_opener(opener: O) -> Self {
		Self {
			ports: DEFAULT_PORTS,
			page: ResponsePage::default(),
			opener,
		}
	}

	pub fn with_ports(self, ports: RangeInclusive<u16>) -> Self {
		Self { ports, ..self }
	}

	pub fn with_page(self, page: ResponsePage) -> Self {
		Self { page, ..self }
	}

	async fn bind(&self, redirect_uri: Option<&Uri>) -> Result<(TcpListener, UriBuf), Error> {
		let mut url = match redirect_uri {
			Some(uri) => url::Url::parse(uri.as_str()).map_err(Error::configuration)?,
			None => url::Url::parse("http://127.0.0.1/").map_err(Error::configuration)?,
		};

		if url.scheme() != "http" {
			return Err(Error::configuration(
				"loopback redirect URI must use the `http` scheme",
			));
		}

		let addresses = loopback_addresses(url.host())?;
		let ports = match url.port() {
			Some(port) if port != 0 => port..=port,
			_ => self.ports.clone(),
		};

		let (listener, port) = probe(&addresses, ports).await?;
		url.set_port(Some(port))
			.map_err(|_| Error::configuration("redirect URI cannot carry a port"))?;

		let redirect_uri = UriBuf::new(url.to_string().into_bytes())
			.map_err(|_| Error::configuration("invalid loopback redirect URI"))?;

		log::debug!("listening for the redirect on {redirect_uri}");
		Ok((listener, redirect_uri))
	}
}

/// Interfaces to bind for the redirect URI host, in order of preference.
fn loopback_addresses(host: Option<url::Host<&str>>) -> Result<Vec<IpAddr>, Error> {
	match host {
		Some(url::Host::Ipv4(ip)) if ip.is_loopback() => Ok(vec![ip.into()]),
		Some(url::Host::Ipv6(ip)) if ip.is_loopback() => Ok(vec![ip.into()]),
		Some(url::Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
			Ok(vec![Ipv4Addr::LOCALHOST.into(), Ipv6Addr::LOCALHOST.into()])
		}
		Some(host) => Err(Error::configuration(format!(
			"loopback redirect URI host `{host}` is not a loopback address"
		))),
		None => Err(Error::configuration("loopback redirect URI has no host")),
	}
}

async fn probe(
	addresses: &[IpAddr],
	ports: RangeInclusive<u16>,
) -> Result<(TcpListener, u16), Error> {
	for port in ports.clone() {
		for &ip in addresses {
			match TcpListener::bind(SocketAddr::new(ip, port)).await {
				Ok(listener) => return Ok((listener, port)),
				Err(e) => log::debug!("{ip} port {port} unavailable: {e}"),
			}
		}
	}

	Err(Error::transport(format!(
		"no free loopback port in {}..={}",
		ports.start(),
		ports.end()
	)))
}

struct Callback {
	/// Scheme and authority of the redirect URI, prepended to the request
	/// target.
	origin: String,
	redirect_uri: String,
	page: ResponsePage,
	sender: mpsc::Sender<String>,
}

async fn callback(State(callback): State<Arc<Callback>>, target: RequestUri) -> Response {
	let path_and_query = target
		.path_and_query()
		.map(|p| p.as_str())
		.unwrap_or("/");
	let uri = format!("{}{path_and_query}", callback.origin);

	if !is_redirect_to(&uri, &callback.redirect_uri) {
		log::debug!("ignoring request to {path_and_query}");
		return StatusCode::NOT_FOUND.into_response();
	}

	// Only the first redirect is kept.
	let _ = callback.sender.try_send(uri);
	(&callback.page).into_response()
}

impl<O: UriOpener> RedirectCapture for LoopbackCapture<O> {
	async fn capture(&mut self, request: CaptureRequest<'_>) -> Result<CaptureOutcome, Error> {
		let (listener, redirect_uri) = self.bind(request.redirect_uri).await?;
		let start_uri = (request.authorization_uri)(Some(&redirect_uri))?;

		let origin = url::Url::parse(redirect_uri.as_str())
			.map(|url| url.origin().ascii_serialization())
			.map_err(Error::configuration)?;

		let (sender, mut receiver) = mpsc::channel(1);
		let app = Router::new().fallback(callback).with_state(Arc::new(Callback {
			origin,
			redirect_uri: redirect_uri.as_str().to_owned(),
			page: self.page.clone(),
			sender,
		}));

		let stop = CancellationToken::new();
		let server = axum::serve(listener, app)
			.with_graceful_shutdown(stop.clone().cancelled_owned())
			.into_future();
		tokio::pin!(server);

		self.opener.open(&start_uri)?;

		let outcome = tokio::select! {
			Some(uri) = receiver.recv() => CaptureOutcome::Redirected(CapturedRedirect {
				uri,
				redirect_uri: Some(redirect_uri),
			}),
			_ = request.cancel.cancelled() => {
				log::info!("redirect capture cancelled");
				CaptureOutcome::Cancelled
			}
			result = &mut server => {
				return Err(match result {
					Ok(()) => Error::transport("loopback listener stopped unexpectedly"),
					Err(e) => Error::transport(e),
				});
			}
		};

		stop.cancel();
		if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
			log::debug!("loopback listener did not shut down gracefully");
		}

		Ok(outcome)
	}
}
