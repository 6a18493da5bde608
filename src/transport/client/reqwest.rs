use crate::{error::Error, transport::HttpClient};

impl HttpClient for reqwest::Client {
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, Error> {
		// Only the path is logged: the query of a decision request names the
		// items and the device.
		log::debug!("HTTP {} {}", request.method(), request.uri().path());

		let request = reqwest::Request::try_from(request).map_err(Error::transport)?;
		let response = self.execute(request).await.map_err(transport_error)?;
		into_http_response(response).await
	}
}

async fn into_http_response(
	response: reqwest::Response,
) -> Result<http::Response<Vec<u8>>, Error> {
	let status = response.status();
	let version = response.version();
	let headers = response.headers().clone();
	let body = response.bytes().await.map_err(transport_error)?;

	let mut converted = http::Response::new(body.to_vec());
	*converted.status_mut() = status;
	*converted.version_mut() = version;
	*converted.headers_mut() = headers;

	log::trace!("HTTP response: {status} ({} bytes)", converted.body().len());
	Ok(converted)
}

fn transport_error(e: reqwest::Error) -> Error {
	if e.is_timeout() {
		Error::transport(format!("request timed out: {e}"))
	} else if e.is_connect() {
		Error::transport(format!("connection failed: {e}"))
	} else {
		Error::transport(e)
	}
}
