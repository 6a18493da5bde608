//! Redirect capture strategies.
//!
//! A strategy shows the authorization URI to the user in some user agent and
//! waits until that user agent is redirected to the client's redirect URI.
//! Three strategies are provided:
//!
//! - [`LoopbackCapture`] (feature `axum`) opens the system browser and
//!   receives the redirect on an ephemeral loopback HTTP listener.
//! - [`EmbeddedBrowserCapture`] drives a [`BrowserWindow`] supplied by the
//!   host and intercepts the navigation to the redirect URI.
//! - [`DelegateCapture`] hands the URI to the host, which reports the
//!   redirect itself through a [`RedirectSink`].
//!
//! Every strategy holds its resources (listener, window, temporary files)
//! inside the future returned by [`RedirectCapture::capture`]: they are
//! released when the future completes or is dropped.
use iref::{Uri, UriBuf};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

pub mod browser;
pub mod delegate;
#[cfg(feature = "axum")]
pub mod listener;

pub use browser::{
	BrowserEvent, BrowserWindow, EmbeddedBrowserCapture, NavigationAction, PendingNavigation,
};
pub use delegate::{DelegateCapture, RedirectSink};
#[cfg(feature = "axum")]
pub use listener::{LoopbackCapture, ResponsePage, SystemBrowser, UriOpener};

/// Builds the authorization URI for the redirect URI the strategy listens
/// on.
pub type AuthorizationUriFn<'a> =
	dyn Fn(Option<&Uri>) -> Result<UriBuf, Error> + Send + Sync + 'a;

/// Input of one capture.
pub struct CaptureRequest<'a> {
	/// Configured redirect URI, if any.
	///
	/// A strategy may announce a different one (the loopback listener fills in
	/// the port it bound).
	pub redirect_uri: Option<&'a Uri>,

	/// Called once, with the redirect URI the strategy actually watches.
	pub authorization_uri: &'a AuthorizationUriFn<'a>,

	/// Stops the wait when cancelled.
	pub cancel: CancellationToken,
}

/// Redirect received by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRedirect {
	/// Full callback URI, including the response parameters.
	pub uri: String,

	/// Redirect URI sent in the authorization request.
	pub redirect_uri: Option<UriBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
	Redirected(CapturedRedirect),

	/// The user closed the window, the host gave up, or the cancellation
	/// token fired.
	Cancelled,
}

/// Strategy obtaining the authorization response from a user agent.
///
/// One instance serves one authorization at a time, which `&mut self`
/// enforces.
pub trait RedirectCapture {
	#[allow(async_fn_in_trait)]
	async fn capture(&mut self, request: CaptureRequest<'_>) -> Result<CaptureOutcome, Error>;
}

impl<T: RedirectCapture> RedirectCapture for &mut T {
	async fn capture(&mut self, request: CaptureRequest<'_>) -> Result<CaptureOutcome, Error> {
		T::capture(*self, request).await
	}
}

/// Returns `true` if `uri` is an address under `redirect_uri`.
///
/// The comparison ignores ASCII case in the scheme and authority, which user
/// agents may normalize.
pub fn is_redirect_to(uri: &str, redirect_uri: &str) -> bool {
	let (uri, prefix) = (uri.as_bytes(), redirect_uri.as_bytes());
	if uri.len() < prefix.len() {
		return false;
	}

	let end = authority_end(redirect_uri);
	uri[..end].eq_ignore_ascii_case(&prefix[..end]) && uri[end..prefix.len()] == prefix[end..]
}

fn authority_end(uri: &str) -> usize {
	match uri.find("://") {
		Some(i) => {
			let rest = &uri[i + 3..];
			i + 3 + rest.find(['/', '?', '#']).unwrap_or(rest.len())
		}
		None => 0,
	}
}
