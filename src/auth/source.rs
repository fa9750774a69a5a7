//! Access-token collaborator contract.
//!
//! The session never mints or refreshes bearer tokens itself. It asks an
//! [`AccessTokenSource`] for a currently valid token before every CSRF evaluation and
//! treats any failure as terminal (`Error::AuthExpired`).

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialStore, StoreError},
};

/// Boxed future returned by [`AccessTokenSource::valid_access_token`].
pub type AccessTokenFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TokenSecret, AccessTokenError>> + 'a + Send>>;

/// Produces a currently valid bearer token or fails when the session can no longer be renewed.
pub trait AccessTokenSource
where
	Self: Send + Sync,
{
	/// Returns a valid access token, refreshing it through whatever mechanism the
	/// implementation owns.
	fn valid_access_token(&self) -> AccessTokenFuture<'_>;
}

/// Failures reported by an [`AccessTokenSource`].
#[derive(Debug, ThisError)]
pub enum AccessTokenError {
	/// No access token has been issued for this session.
	#[error("No access token is available for this session.")]
	Missing,
	/// The collaborator tried to renew the token and was refused.
	#[error("Access token could not be refreshed: {reason}.")]
	Refresh {
		/// Collaborator-supplied reason string.
		reason: String,
	},
	/// Reading the token from storage failed.
	#[error(transparent)]
	Storage(#[from] StoreError),
}

/// Reads the access token that the login flow wrote into the [`CredentialStore`].
#[derive(Clone)]
pub struct StoredAccessToken {
	store: Arc<dyn CredentialStore>,
}
impl StoredAccessToken {
	/// Creates a source backed by the provided store.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self { store }
	}
}
impl AccessTokenSource for StoredAccessToken {
	fn valid_access_token(&self) -> AccessTokenFuture<'_> {
		Box::pin(async move {
			let credentials = self.store.get().await?;

			credentials
				.access_token
				.filter(|token| !token.is_blank())
				.ok_or(AccessTokenError::Missing)
		})
	}
}
impl Debug for StoredAccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StoredAccessToken(..)")
	}
}

/// Fixed access token, useful for service accounts and tests.
#[derive(Clone, Debug)]
pub struct StaticAccessToken(TokenSecret);
impl StaticAccessToken {
	/// Wraps the provided token.
	pub fn new(token: impl Into<TokenSecret>) -> Self {
		Self(token.into())
	}
}
impl AccessTokenSource for StaticAccessToken {
	fn valid_access_token(&self) -> AccessTokenFuture<'_> {
		let token = self.0.clone();

		Box::pin(async move { Ok(token) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	#[tokio::test]
	async fn stored_source_reports_missing_token() {
		let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
		let source = StoredAccessToken::new(store);
		let err = source
			.valid_access_token()
			.await
			.expect_err("An empty store should not yield an access token.");

		assert!(matches!(err, AccessTokenError::Missing));
	}

	#[tokio::test]
	async fn stored_source_returns_persisted_token() {
		let backend = Arc::new(MemoryStore::default());

		backend
			.set_access_token(TokenSecret::new("bearer-1"))
			.await
			.expect("Seeding the access token should succeed.");

		let store: Arc<dyn CredentialStore> = backend;
		let token = StoredAccessToken::new(store)
			.valid_access_token()
			.await
			.expect("A seeded store should yield its access token.");

		assert_eq!(token.expose(), "bearer-1");
	}

	#[tokio::test]
	async fn stored_source_ignores_blank_tokens() {
		let backend = Arc::new(MemoryStore::default());

		backend
			.set_access_token(TokenSecret::new("  "))
			.await
			.expect("Seeding the access token should succeed.");

		let store: Arc<dyn CredentialStore> = backend;
		let err = StoredAccessToken::new(store)
			.valid_access_token()
			.await
			.expect_err("Blank tokens should be treated as missing.");

		assert!(matches!(err, AccessTokenError::Missing));
	}
}
