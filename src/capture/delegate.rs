//! Host-driven capture.
use iref::Uri;
use tokio::sync::oneshot;

use crate::error::Error;

use super::{CaptureOutcome, CaptureRequest, CapturedRedirect, RedirectCapture};

/// Reports the redirect observed by the host.
///
/// Dropping the sink without calling [`Self::complete`] cancels the capture.
#[derive(Debug)]
pub struct RedirectSink {
	sender: oneshot::Sender<Option<String>>,
}

impl RedirectSink {
	/// Completes the capture with the full callback URI.
	pub fn complete(self, uri: impl Into<String>) {
		let _ = self.sender.send(Some(uri.into()));
	}

	pub fn cancel(self) {
		let _ = self.sender.send(None);
	}
}

/// Lets the host application open the authorization URI in any user agent.
///
/// `open` receives the authorization URI and a [`RedirectSink`]. It must
/// return promptly; the host keeps the sink and uses it once it sees the
/// redirect.
pub struct DelegateCapture<F> {
	open: F,
}

impl<F> DelegateCapture<F>
where
	F: FnMut(&Uri, RedirectSink) -> Result<(), Error>,
{
	pub fn new(open: F) -> Self {
		Self { open }
	}
}

impl<F> RedirectCapture for DelegateCapture<F>
where
	F: FnMut(&Uri, RedirectSink) -> Result<(), Error>,
{
	async fn capture(&mut self, request: CaptureRequest<'_>) -> Result<CaptureOutcome, Error> {
		let start_uri = (request.authorization_uri)(request.redirect_uri)?;

		let (sender, receiver) = oneshot::channel();
		(self.open)(&start_uri, RedirectSink { sender })?;

		tokio::select! {
			received = receiver => match received {
				Ok(Some(uri)) => Ok(CaptureOutcome::Redirected(CapturedRedirect {
					uri,
					redirect_uri: request.redirect_uri.map(ToOwned::to_owned),
				})),
				Ok(None) | Err(_) => {
					log::info!("redirect capture cancelled by the host");
					Ok(CaptureOutcome::Cancelled)
				}
			},
			_ = request.cancel.cancelled() => Ok(CaptureOutcome::Cancelled),
		}
	}
}
