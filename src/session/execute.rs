//! Secure request executor.
//!
//! Every call refreshes credentials first, attaches the bearer and CSRF headers, captures
//! any CSRF token the server rotates on the response, and resends the same request after a
//! forced CSRF exchange when the server rejects it for CSRF reasons. Resends are bounded
//! by [`SessionConfig::max_attempts`](crate::session::SessionConfig::max_attempts); once the
//! bound is reached the last server response is returned unchanged.

// crates.io
use ::http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	csrf::ResponseClass,
	error::TransportError,
	http::{HttpRequest, HttpResponse, SessionHttpClient},
	obs::{self, OpKind, OpOutcome, OpSpan, debug_event, warn_event},
	session::{Session, SessionCredentials, secret_header},
};

/// Server response returned by the secure executor, with its classification.
#[derive(Clone, Debug)]
pub struct SecureResponse {
	/// Last response received from the server.
	pub response: HttpResponse,
	/// Classification of [`SecureResponse::response`].
	pub class: ResponseClass,
	/// Number of times the request was sent.
	pub attempts: u32,
}
impl SecureResponse {
	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.class == ResponseClass::Success
	}

	/// Returns `true` when the server answered `404`.
	pub fn is_not_found(&self) -> bool {
		self.class == ResponseClass::NotFound
	}

	/// Returns `true` when the retry bound was exhausted on CSRF rejections.
	pub fn is_csrf_rejected(&self) -> bool {
		self.class == ResponseClass::CsrfRejected
	}

	/// Consumes the wrapper and returns the raw response.
	pub fn into_response(self) -> HttpResponse {
		self.response
	}
}

impl<C> Session<C>
where
	C: ?Sized + SessionHttpClient,
{
	/// Sends `request` with fresh credentials, retrying on CSRF rejections.
	///
	/// `Error::AuthExpired` is terminal and is never retried. Transport failures of the
	/// wrapped request propagate as `Error::Transport` without a retry.
	pub async fn execute(&self, request: HttpRequest) -> Result<SecureResponse> {
		self.execute_with_cancel(request, &CancellationToken::new()).await
	}

	/// Same as [`Session::execute`], aborting with `Error::Cancelled` as soon as `cancel`
	/// fires, including while waiting between retries.
	pub async fn execute_with_cancel(
		&self,
		request: HttpRequest,
		cancel: &CancellationToken,
	) -> Result<SecureResponse> {
		const KIND: OpKind = OpKind::SecureRequest;

		let span = OpSpan::new(KIND, "execute");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.execute_bounded(&request, cancel, &span)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn execute_bounded(
		&self,
		request: &HttpRequest,
		cancel: &CancellationToken,
		span: &OpSpan,
	) -> Result<SecureResponse> {
		let delay = std::time::Duration::try_from(self.config.retry_delay).unwrap_or_default();
		let mut credentials = until_cancelled(cancel, self.refresh_all()).await?;
		let mut attempts = 1;

		loop {
			let outgoing = self.authorize(request, &credentials)?;

			self.metrics.record_request();

			let response = until_cancelled(cancel, async {
				self.http_client
					.send(outgoing)
					.await
					.map_err(|err| Error::from(TransportError::network(err)))
			})
			.await?;

			self.capture_rotation(&response).await;

			let class = self.config.protocol.classify(&response);

			span.record_attempts(attempts);
			span.record_class(class);
			obs::record_response(class);

			if class != ResponseClass::CsrfRejected {
				return Ok(SecureResponse { response, class, attempts });
			}
			if attempts >= self.config.max_attempts {
				warn_event!(attempts, "CSRF retries exhausted; returning the last response.");

				return Ok(SecureResponse { response, class, attempts });
			}

			debug_event!(attempts, "Request rejected for CSRF reasons; retrying.");
			until_cancelled(cancel, async {
				tokio::time::sleep(delay).await;

				Ok(())
			})
			.await?;

			credentials =
				until_cancelled(cancel, self.refresh_after_rejection(&credentials)).await?;
			attempts += 1;

			self.metrics.record_retry();
		}
	}

	/// Layers the security headers over the caller's headers.
	fn authorize(
		&self,
		request: &HttpRequest,
		credentials: &SessionCredentials,
	) -> Result<HttpRequest> {
		let csrf_header = &self.config.protocol.header;
		let mut outgoing = request.clone();

		outgoing.headers.insert(
			AUTHORIZATION,
			secret_header(AUTHORIZATION.as_str(), "Bearer ", &credentials.access_token)?,
		);
		outgoing.headers.insert(
			csrf_header.clone(),
			secret_header(csrf_header.as_str(), "", &credentials.csrf_token)?,
		);

		Ok(outgoing)
	}

	/// Stores a CSRF token the server rotated on `response`, whatever its status.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	async fn capture_rotation(&self, response: &HttpResponse) {
		let Some(rotated) = self.config.protocol.extract(response) else {
			return;
		};
		let current = match self.store.get().await {
			Ok(current) => current,
			Err(err) => {
				warn_event!(error = %err, "Unable to read the store for CSRF rotation.");

				return;
			},
		};

		if current.csrf_token() == Some(&rotated) {
			return;
		}

		match self.store.set_csrf(rotated, OffsetDateTime::now_utc()).await {
			Ok(()) => {
				self.metrics.record_rotation();
				debug_event!(status = response.status.as_u16(), "Captured rotated CSRF token.");
			},
			Err(err) => {
				warn_event!(error = %err, "Unable to persist rotated CSRF token.");
			},
		}
	}
}

async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	if cancel.is_cancelled() {
		return Err(Error::Cancelled);
	}

	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		result = fut => result,
	}
}
