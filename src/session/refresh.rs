//! Credential refresh with a single-flight gate around the CSRF exchange.
//!
//! [`Session::refresh_all`] obtains a valid access token from the collaborator, consults
//! the freshness policy, and only performs a CSRF exchange when the stored token is stale.
//! The exchange runs behind the session's refresh gate: callers that queued on the gate
//! re-read the store once they get through and reuse the token the first caller fetched,
//! so at most one exchange is in flight at any instant. A failed exchange is shared the
//! same way: callers that queued behind it receive its error instead of exchanging again.

// std
use std::sync::atomic::Ordering;
// crates.io
use ::http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{HttpRequest, SessionHttpClient},
	obs::{self, OpKind, OpOutcome, OpSpan, debug_event, warn_event},
	session::{Session, secret_header},
	store::Credentials,
};

/// Access token paired with the CSRF token it should be sent with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCredentials {
	/// Bearer access token.
	pub access_token: TokenSecret,
	/// Anti-forgery token.
	pub csrf_token: TokenSecret,
	generation: u64,
}
impl SessionCredentials {
	/// Exchange generation this CSRF token belongs to.
	pub fn generation(&self) -> u64 {
		self.generation
	}
}

/// Outcome of the most recent CSRF exchange when it failed, kept behind the refresh gate.
#[derive(Debug)]
pub(crate) struct FailedExchange {
	/// Value of the finished-exchange counter once this exchange completed.
	finished: u64,
	status: Option<u16>,
	reason: String,
}
impl FailedExchange {
	fn to_error(&self) -> Error {
		Error::CsrfRefreshFailed { status: self.status, reason: self.reason.clone() }
	}
}

#[derive(Clone, Copy, Debug)]
enum RefreshMode<'a> {
	/// Exchange only when the freshness policy reports the stored token as stale.
	IfStale,
	/// Exchange regardless of age unless another caller completed an exchange after
	/// generation `seen` was observed and the store no longer holds `rejected`.
	Force { seen: u64, rejected: Option<&'a TokenSecret> },
}

impl<C> Session<C>
where
	C: ?Sized + SessionHttpClient,
{
	/// Returns a valid access token with a CSRF token, exchanging for a new CSRF token
	/// only when the stored one is absent or older than the configured max-age.
	pub async fn refresh_all(&self) -> Result<SessionCredentials> {
		self.refresh(RefreshMode::IfStale, "refresh_all").await
	}

	/// Exchanges for a new CSRF token regardless of its recorded age.
	///
	/// Concurrent forced refreshes still collapse: a caller that waited on the gate while
	/// another caller completed an exchange reuses that result.
	pub async fn force_refresh(&self) -> Result<SessionCredentials> {
		let seen = self.csrf_generation.load(Ordering::Acquire);

		self.refresh(RefreshMode::Force { seen, rejected: None }, "force_refresh").await
	}

	/// Forced refresh used after the server rejected `rejected`'s CSRF token.
	pub(crate) async fn refresh_after_rejection(
		&self,
		rejected: &SessionCredentials,
	) -> Result<SessionCredentials> {
		let mode =
			RefreshMode::Force { seen: rejected.generation, rejected: Some(&rejected.csrf_token) };

		self.refresh(mode, "retry").await
	}

	async fn refresh(
		&self,
		mode: RefreshMode<'_>,
		stage: &'static str,
	) -> Result<SessionCredentials> {
		const KIND: OpKind = OpKind::CsrfRefresh;

		let span = OpSpan::new(KIND, stage);

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let access_token = self.valid_access_token().await?;

				if let RefreshMode::IfStale = mode {
					let current = self.store.get().await?;

					if let Some(credentials) = self.reusable(&current, &access_token, mode) {
						return Ok(credentials);
					}
				}

				let finished_seen = self.exchanges_finished.load(Ordering::Acquire);
				let mut last_failure = self.refresh_gate.lock().await;
				let current = self.store.get().await?;

				if let Some(credentials) = self.reusable(&current, &access_token, mode) {
					return Ok(credentials);
				}
				// Queued behind an exchange that failed; share its outcome.
				if let Some(failure) =
					last_failure.as_ref().filter(|failure| failure.finished > finished_seen)
				{
					debug_event!("Sharing the failed CSRF exchange with a queued caller.");

					return Err(failure.to_error());
				}

				let exchanged = self.exchange_csrf(&access_token).await;
				let finished = self.exchanges_finished.fetch_add(1, Ordering::AcqRel) + 1;
				let csrf_token = match exchanged {
					Ok(csrf_token) => {
						*last_failure = None;

						csrf_token
					},
					Err(err) => {
						*last_failure = match &err {
							Error::CsrfRefreshFailed { status, reason } => Some(FailedExchange {
								finished,
								status: *status,
								reason: reason.clone(),
							}),
							_ => None,
						};

						return Err(err);
					},
				};

				self.store.set_csrf(csrf_token.clone(), OffsetDateTime::now_utc()).await?;

				let generation = self.csrf_generation.fetch_add(1, Ordering::AcqRel) + 1;

				self.metrics.record_exchange();
				debug_event!(generation, "CSRF token exchanged.");

				Ok(SessionCredentials { access_token, csrf_token, generation })
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => {
				self.metrics.record_refresh_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		result
	}

	/// Returns stored credentials when `mode` allows skipping the exchange.
	fn reusable(
		&self,
		current: &Credentials,
		access_token: &TokenSecret,
		mode: RefreshMode<'_>,
	) -> Option<SessionCredentials> {
		let generation = self.csrf_generation.load(Ordering::Acquire);
		let reuse = match mode {
			RefreshMode::IfStale =>
				!self.config.freshness.is_csrf_stale(current, OffsetDateTime::now_utc()),
			// The generation is bumped after the store write, so a reader may pair a new
			// token with the previous generation; never hand back the token just rejected.
			RefreshMode::Force { seen, rejected } =>
				generation != seen
					&& rejected.is_none_or(|rejected| current.csrf_token() != Some(rejected)),
		};
		let csrf_token = current.csrf_token().filter(|token| reuse && !token.is_blank())?;

		self.metrics.record_reuse();
		debug_event!(generation, "Reusing stored CSRF token.");

		Some(SessionCredentials {
			access_token: access_token.clone(),
			csrf_token: csrf_token.clone(),
			generation,
		})
	}

	/// Asks the collaborator for an access token; any failure ends the session.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	async fn valid_access_token(&self) -> Result<TokenSecret> {
		match self.access_tokens.valid_access_token().await {
			Ok(token) => Ok(token),
			Err(err) => {
				warn_event!(error = %err, "Access token unavailable; clearing session.");

				{
					let _gate = self.refresh_gate.lock().await;

					if let Err(clear_err) = self.store.clear().await {
						warn_event!(error = %clear_err, "Unable to clear the expired session.");
					}
				}

				Err(Error::AuthExpired { reason: err.to_string() })
			},
		}
	}

	/// Calls the CSRF endpoint with `access_token` as the bearer credential.
	async fn exchange_csrf(&self, access_token: &TokenSecret) -> Result<TokenSecret> {
		let authorization = secret_header(AUTHORIZATION.as_str(), "Bearer ", access_token)?;
		let request = HttpRequest::get(self.config.csrf_endpoint.clone())
			.with_header(AUTHORIZATION, authorization);
		let response = self.http_client.send(request).await.map_err(|err| {
			warn_event!(error = %err, "CSRF endpoint unreachable.");

			Error::CsrfRefreshFailed {
				status: None,
				reason: format!("CSRF endpoint is unreachable: {err}"),
			}
		})?;
		let status = response.status.as_u16();

		if !response.is_success() {
			warn_event!(status, "CSRF endpoint rejected the exchange.");

			return Err(Error::CsrfRefreshFailed {
				status: Some(status),
				reason: format!("CSRF endpoint responded with HTTP {status}"),
			});
		}

		self.config.protocol.extract(&response).ok_or_else(|| Error::CsrfRefreshFailed {
			status: Some(status),
			reason: "CSRF endpoint response carried no token".into(),
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// crates.io
	use ::http::StatusCode;
	// self
	use super::*;
	use crate::{
		auth::{AccessTokenSource, StaticAccessToken, StoredAccessToken},
		http::{HttpFuture, HttpResponse},
		session::SessionConfig,
		store::{CredentialStore, MemoryStore, StoreError, StoreFuture},
	};

	#[derive(Debug, ThisError)]
	#[error("Connection refused.")]
	struct Refused;

	/// Transport whose every call fails before a response arrives.
	struct Unreachable;
	impl SessionHttpClient for Unreachable {
		type TransportError = Refused;

		fn send(&self, _request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			Box::pin(async { Err(Refused) })
		}
	}

	/// Transport answering every call with the same canned response.
	struct Canned(HttpResponse);
	impl SessionHttpClient for Canned {
		type TransportError = Refused;

		fn send(&self, _request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			let response = self.0.clone();

			Box::pin(async move { Ok(response) })
		}
	}

	/// CSRF endpoint that answers `503` after a short delay and counts its calls.
	#[derive(Default)]
	struct SlowOutage {
		calls: AtomicUsize,
	}
	impl SessionHttpClient for SlowOutage {
		type TransportError = Refused;

		fn send(&self, _request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(std::time::Duration::from_millis(50)).await;

				Ok(HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, "maintenance"))
			})
		}
	}

	/// Store whose `clear` always fails.
	struct StuckStore;
	impl CredentialStore for StuckStore {
		fn get(&self) -> StoreFuture<'_, Credentials> {
			Box::pin(async { Ok(Credentials::default()) })
		}

		fn set_access_token(&self, _token: TokenSecret) -> StoreFuture<'_, ()> {
			Box::pin(async { Ok(()) })
		}

		fn set_csrf(&self, _token: TokenSecret, _at: OffsetDateTime) -> StoreFuture<'_, ()> {
			Box::pin(async { Ok(()) })
		}

		fn clear(&self) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "Disk is read-only.".into() }) })
		}
	}

	fn fixture_config() -> SessionConfig {
		let endpoint = Url::parse("https://api.example.com/auth/csrf")
			.expect("Fixture endpoint should parse.");

		SessionConfig::builder(endpoint).build().expect("Fixture config should build.")
	}

	fn session<C>(client: C) -> (Session<C>, Arc<MemoryStore>)
	where
		C: SessionHttpClient,
	{
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = backend.clone();
		let access_tokens: Arc<dyn AccessTokenSource> = Arc::new(StaticAccessToken::new("bearer"));

		(Session::with_http_client(store, access_tokens, fixture_config(), client), backend)
	}

	#[tokio::test]
	async fn unreachable_endpoint_is_a_csrf_refresh_failure() {
		let (session, store) = session(Unreachable);
		let err = session.refresh_all().await.expect_err("Exchange should fail without a server.");

		assert!(matches!(err, Error::CsrfRefreshFailed { status: None, .. }));
		assert!(store.snapshot().csrf.is_none());
		assert_eq!(session.metrics.refresh_failures(), 1);
	}

	#[tokio::test]
	async fn non_success_status_is_reported() {
		let (session, _) = session(Canned(HttpResponse::new(StatusCode::BAD_GATEWAY, "")));
		let err = session.refresh_all().await.expect_err("A 502 exchange should fail.");

		assert!(matches!(err, Error::CsrfRefreshFailed { status: Some(502), .. }));
	}

	#[tokio::test]
	async fn success_without_token_is_reported() {
		let (session, _) = session(Canned(HttpResponse::new(StatusCode::OK, "{}")));
		let err = session.refresh_all().await.expect_err("A token-less exchange should fail.");

		assert!(matches!(err, Error::CsrfRefreshFailed { status: Some(200), .. }));
	}

	#[tokio::test]
	async fn body_token_is_stored_with_timestamp() {
		let (session, store) =
			session(Canned(HttpResponse::new(StatusCode::OK, r#"{"csrf_token":"from-body"}"#)));
		let before = OffsetDateTime::now_utc();
		let credentials = session.refresh_all().await.expect("Exchange should succeed.");

		assert_eq!(credentials.access_token.expose(), "bearer");
		assert_eq!(credentials.csrf_token.expose(), "from-body");
		assert_eq!(credentials.generation(), 1);

		let snapshot = store.snapshot();

		assert_eq!(snapshot.csrf_token().map(TokenSecret::expose), Some("from-body"));
		assert!(snapshot.csrf_refreshed_at().is_some_and(|at| at >= before));
	}

	#[tokio::test]
	async fn force_refresh_ignores_fresh_tokens() {
		let (session, store) =
			session(Canned(HttpResponse::new(StatusCode::OK, r#"{"csrf_token":"forced"}"#)));

		store
			.set_csrf("still-fresh".into(), OffsetDateTime::now_utc())
			.await
			.expect("Seeding the CSRF token should succeed.");

		let reused = session.refresh_all().await.expect("Fresh token should be reused.");

		assert_eq!(reused.csrf_token.expose(), "still-fresh");

		let forced = session.force_refresh().await.expect("Forced exchange should succeed.");

		assert_eq!(forced.csrf_token.expose(), "forced");
		assert_eq!(session.metrics.csrf_exchanges(), 1);
		assert_eq!(session.metrics.csrf_reuses(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn queued_callers_share_a_failed_exchange() {
		let (session, _) = session(SlowOutage::default());
		let mut tasks = Vec::new();

		for _ in 0..8 {
			let session = session.clone();

			tasks.push(tokio::spawn(async move { session.refresh_all().await }));
		}

		for task in tasks {
			let err = task
				.await
				.expect("Refresh task should not panic.")
				.expect_err("Every caller should see the outage.");

			assert!(matches!(err, Error::CsrfRefreshFailed { status: Some(503), .. }));
		}

		assert_eq!(session.http_client.calls.load(Ordering::SeqCst), 1);

		// A caller arriving after the failure settled tries the endpoint again.
		let err = session.refresh_all().await.expect_err("The outage is still ongoing.");

		assert!(matches!(err, Error::CsrfRefreshFailed { status: Some(503), .. }));
		assert_eq!(session.http_client.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn rejected_token_is_never_reused_by_a_forced_refresh() {
		let (session, _) =
			session(Canned(HttpResponse::new(StatusCode::OK, r#"{"csrf_token":"renewed"}"#)));
		let current = session.refresh_all().await.expect("Exchange should succeed.");

		assert_eq!(current.generation(), 1);

		// The stored token paired with the generation before it was written.
		let rejected = SessionCredentials { generation: 0, ..current };
		let retried = session
			.refresh_after_rejection(&rejected)
			.await
			.expect("Forced exchange should succeed.");

		assert_eq!(retried.generation(), 2);
		assert_eq!(session.metrics.csrf_exchanges(), 2);
	}

	#[tokio::test]
	async fn access_token_failure_expires_even_when_clear_fails() {
		let store: Arc<dyn CredentialStore> = Arc::new(StuckStore);
		let access_tokens: Arc<dyn AccessTokenSource> =
			Arc::new(StoredAccessToken::new(store.clone()));
		let session =
			Session::with_http_client(store, access_tokens, fixture_config(), Unreachable);
		let err = session.refresh_all().await.expect_err("A missing access token should expire.");

		assert!(matches!(err, Error::AuthExpired { .. }));
		assert_eq!(session.metrics.refresh_failures(), 1);
	}
}
