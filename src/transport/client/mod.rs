use crate::error::Error;

#[cfg(feature = "reqwest")]
mod reqwest;

#[cfg(test)]
pub(crate) mod testing;

/// Asynchronous HTTP client used for every network exchange.
///
/// Implementations are expected to be long-lived and safe to share between
/// independent flows. Status codes are returned as-is: interpreting a
/// non-success status is the caller's job.
pub trait HttpClient {
	#[allow(async_fn_in_trait)]
	async fn send(&self, request: http::Request<Vec<u8>>)
	-> Result<http::Response<Vec<u8>>, Error>;
}

impl<T> HttpClient for &T
where
	T: HttpClient,
{
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, Error> {
		T::send(*self, request).await
	}
}

impl<T> HttpClient for std::sync::Arc<T>
where
	T: HttpClient,
{
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, Error> {
		T::send(self, request).await
	}
}
