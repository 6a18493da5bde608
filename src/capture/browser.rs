//! Embedded browser window.
//!
//! The window itself (toolkit, renderer) belongs to the host application and
//! is reached through [`BrowserWindow`]. This module owns the interception
//! logic: every navigation is reported to the capture, which blocks the one
//! going to the redirect URI and closes the window.
use std::io::Write;

use tempfile::NamedTempFile;
use tokio::sync::oneshot;

use crate::error::Error;

use super::{CaptureOutcome, CaptureRequest, CapturedRedirect, RedirectCapture, is_redirect_to};

const DEFAULT_LOADING_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>Loading</title></head>\
<body><p>Loading the sign-in page...</p></body></html>";

/// What the renderer does with a pending navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationAction {
	Allow,
	Block,
}

/// Navigation the renderer is about to perform, waiting for a decision.
///
/// Dropping it without a decision allows the navigation.
#[derive(Debug)]
pub struct PendingNavigation {
	uri: String,
	decision: oneshot::Sender<NavigationAction>,
}

impl PendingNavigation {
	/// Creates a pending navigation and the receiver the window awaits before
	/// proceeding.
	pub fn new(uri: impl Into<String>) -> (Self, oneshot::Receiver<NavigationAction>) {
		let (decision, receiver) = oneshot::channel();
		(
			Self {
				uri: uri.into(),
				decision,
			},
			receiver,
		)
	}

	pub fn uri(&self) -> &str {
		&self.uri
	}

	pub fn allow(self) {
		let _ = self.decision.send(NavigationAction::Allow);
	}

	pub fn block(self) {
		let _ = self.decision.send(NavigationAction::Block);
	}
}

#[derive(Debug)]
pub enum BrowserEvent {
	Navigating(PendingNavigation),

	/// The user closed the window.
	Closed,
}

/// Window hosting an embedded renderer.
pub trait BrowserWindow {
	/// Shows and focuses the window.
	fn show(&mut self) -> Result<(), Error>;

	fn navigate(&mut self, uri: &str) -> Result<(), Error>;

	/// Waits for the next navigation or for the window to be closed.
	#[allow(async_fn_in_trait)]
	async fn next_event(&mut self) -> BrowserEvent;

	/// Closes the window and releases the renderer. Called exactly once per
	/// capture, unless the window reported [`BrowserEvent::Closed`].
	fn close(&mut self);
}

/// Closes the window when dropped.
struct OpenWindow<'a, W: BrowserWindow> {
	window: &'a mut W,
	open: bool,
}

impl<'a, W: BrowserWindow> OpenWindow<'a, W> {
	fn show(window: &'a mut W) -> Result<Self, Error> {
		let mut open = Self {
			window,
			open: true,
		};
		open.window.show()?;
		Ok(open)
	}
}

impl<W: BrowserWindow> Drop for OpenWindow<'_, W> {
	fn drop(&mut self) {
		if self.open {
			self.window.close();
		}
	}
}

/// Temporary HTML page shown while the authorization page loads. The file
/// is deleted on drop.
struct LoadingPage {
	file: NamedTempFile,
}

impl LoadingPage {
	fn write(html: &str) -> Result<Self, Error> {
		let mut file = tempfile::Builder::new()
			.prefix("authorization-")
			.suffix(".html")
			.tempfile()
			.map_err(Error::transport)?;
		file.write_all(html.as_bytes()).map_err(Error::transport)?;
		file.flush().map_err(Error::transport)?;
		Ok(Self { file })
	}

	fn uri(&self) -> Result<String, Error> {
		url::Url::from_file_path(self.file.path())
			.map(String::from)
			.map_err(|_| Error::invalid_state("loading page path is not absolute"))
	}
}

/// Captures the redirect inside an embedded browser window.
pub struct EmbeddedBrowserCapture<W> {
	window: W,
	loading_page: String,
}

impl<W: BrowserWindow> EmbeddedBrowserCapture<W> {
	pub fn new(window: W) -> Self {
		Self {
			window,
			loading_page: DEFAULT_LOADING_PAGE.to_owned(),
		}
	}

	pub fn with_loading_page(self, html: impl Into<String>) -> Self {
		Self {
			loading_page: html.into(),
			..self
		}
	}

	pub fn window(&self) -> &W {
		&self.window
	}

	pub fn into_window(self) -> W {
		self.window
	}
}

impl<W: BrowserWindow> RedirectCapture for EmbeddedBrowserCapture<W> {
	async fn capture(&mut self, request: CaptureRequest<'_>) -> Result<CaptureOutcome, Error> {
		let redirect_uri = request.redirect_uri.ok_or_else(|| {
			Error::configuration("embedded browser capture requires a `redirect_uri`")
		})?;
		let start_uri = (request.authorization_uri)(Some(redirect_uri))?;

		let loading_page = LoadingPage::write(&self.loading_page)?;
		let mut window = OpenWindow::show(&mut self.window)?;
		window.window.navigate(&loading_page.uri()?)?;
		window.window.navigate(start_uri.as_str())?;

		loop {
			let event = tokio::select! {
				event = window.window.next_event() => event,
				_ = request.cancel.cancelled() => {
					log::info!("redirect capture cancelled");
					return Ok(CaptureOutcome::Cancelled);
				}
			};

			match event {
				BrowserEvent::Navigating(navigation)
					if is_redirect_to(navigation.uri(), redirect_uri.as_str()) =>
				{
					let uri = navigation.uri().to_owned();
					navigation.block();
					log::debug!("redirect intercepted");
					return Ok(CaptureOutcome::Redirected(CapturedRedirect {
						uri,
						redirect_uri: Some(redirect_uri.to_owned()),
					}));
				}
				BrowserEvent::Navigating(navigation) => navigation.allow(),
				BrowserEvent::Closed => {
					window.open = false;
					log::info!("browser window closed by the user");
					return Ok(CaptureOutcome::Cancelled);
				}
			}
		}
	}
}
