//! Transport primitives for credentialed requests.
//!
//! The module exposes [`SessionHttpClient`] together with the crate-owned
//! [`HttpRequest`]/[`HttpResponse`] pair so downstream crates can plug in custom HTTP
//! stacks (or scripted fakes in tests) without the session depending on a specific
//! client. Requests are cloneable because the executor resends the same request on a
//! CSRF rejection.

// std
use std::{borrow::Cow, ops::Deref};
// crates.io
use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
// self
use crate::{_prelude::*, error::ConfigError};

/// Boxed future returned by [`SessionHttpClient::send`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports used by the session for CSRF exchanges and wrapped
/// requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// every concurrent caller of a session. Transports are expected to keep cookies between
/// calls (credentialed transport); the session only manages the `Authorization` and CSRF
/// headers.
pub trait SessionHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport when no response was received.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends the request and resolves with whatever response the server produced,
	/// regardless of status.
	fn send(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Outbound request description.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Caller-supplied headers; security headers are layered on top by the session.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl HttpRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request carrying `body`.
	pub fn post(url: Url, body: impl Into<Vec<u8>>) -> Self {
		Self::new(Method::POST, url).with_body(body)
	}

	/// Replaces the request body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type` accordingly.
	pub fn with_json<T>(self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload).map_err(ConfigError::http_request)?;

		Ok(self
			.with_header(::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(body))
	}

	/// Inserts (or replaces) a caller header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}
}

/// Response captured from the transport, body fully buffered.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response with the provided status, empty headers, and body.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Inserts (or replaces) a response header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the body as text, replacing invalid UTF-8 sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Parses the body as JSON into `T`.
	pub fn json<T>(&self) -> serde_json::Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		serde_json::from_slice(&self.body)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Use [`ReqwestHttpClient::cookie_jar`] for credentialed transport; the wrapped
/// session cookies are then replayed on every request exactly as a browser would.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with an in-memory cookie store enabled.
	pub fn cookie_jar() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl SessionHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn send(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let HttpRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(HttpResponse { status, headers, body })
		})
	}
}
