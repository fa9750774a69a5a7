//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialStore, Credentials, CsrfCredential, StoreFuture},
};

type StoreCell = Arc<RwLock<Credentials>>;

/// Thread-safe storage backend that keeps the session record in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreCell);
impl MemoryStore {
	/// Creates a store pre-populated with the provided credentials.
	pub fn with_credentials(credentials: Credentials) -> Self {
		Self(Arc::new(RwLock::new(credentials)))
	}

	/// Returns the current credentials without going through the async contract.
	pub fn snapshot(&self) -> Credentials {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Credentials> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().clone()) })
	}

	fn set_access_token(&self, token: TokenSecret) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			cell.write().access_token = Some(token);

			Ok(())
		})
	}

	fn set_csrf(&self, token: TokenSecret, refreshed_at: OffsetDateTime) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			cell.write().csrf = Some(CsrfCredential { token, refreshed_at });

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			*cell.write() = Credentials::default();

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_csrf_overwrites_previous_value() {
		let store = MemoryStore::default();
		let earlier = OffsetDateTime::now_utc() - Duration::minutes(30);
		let later = OffsetDateTime::now_utc();

		store.set_csrf("first".into(), earlier).await.expect("First CSRF write should succeed.");
		store.set_csrf("second".into(), later).await.expect("Second CSRF write should succeed.");

		let credentials = store.get().await.expect("Reading the store should succeed.");

		assert_eq!(credentials.csrf_token().map(TokenSecret::expose), Some("second"));
		assert_eq!(credentials.csrf_refreshed_at(), Some(later));
	}

	#[tokio::test]
	async fn clear_returns_to_anonymous() {
		let store = MemoryStore::default();

		store.set_access_token("bearer".into()).await.expect("Access token write should succeed.");
		store
			.set_csrf("csrf".into(), OffsetDateTime::now_utc())
			.await
			.expect("CSRF write should succeed.");
		store.clear().await.expect("Clearing the store should succeed.");

		assert!(store.snapshot().is_anonymous());
	}
}
