//! Scripted HTTP client for unit tests.
use std::{collections::VecDeque, sync::Mutex};

use http::{HeaderValue, StatusCode, header};

use crate::{error::Error, transport::HttpClient};

/// Replays queued responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedHttpClient {
	responses: Mutex<VecDeque<Result<http::Response<Vec<u8>>, String>>>,
	requests: Mutex<Vec<http::Request<Vec<u8>>>>,
}

impl ScriptedHttpClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn respond(self, status: StatusCode, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
		let response = http::Response::builder()
			.status(status)
			.header(
				header::CONTENT_TYPE,
				HeaderValue::from_str(content_type).unwrap(),
			)
			.body(body.into())
			.unwrap();
		self.responses.lock().unwrap().push_back(Ok(response));
		self
	}

	pub fn respond_json(self, body: serde_json::Value) -> Self {
		self.respond(StatusCode::OK, "application/json", body.to_string())
	}

	pub fn fail(self, message: &str) -> Self {
		self.responses
			.lock()
			.unwrap()
			.push_back(Err(message.to_owned()));
		self
	}

	pub fn requests(&self) -> std::sync::MutexGuard<'_, Vec<http::Request<Vec<u8>>>> {
		self.requests.lock().unwrap()
	}

	pub fn request_count(&self) -> usize {
		self.requests.lock().unwrap().len()
	}
}

impl HttpClient for ScriptedHttpClient {
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, Error> {
		self.requests.lock().unwrap().push(request);
		match self.responses.lock().unwrap().pop_front() {
			Some(Ok(response)) => Ok(response),
			Some(Err(message)) => Err(Error::transport(message)),
			None => Err(Error::transport("no scripted response left")),
		}
	}
}

/// Body of a recorded request, as UTF-8.
pub fn body_str(request: &http::Request<Vec<u8>>) -> &str {
	std::str::from_utf8(request.body()).unwrap()
}
