//! Storage contracts and built-in credential store implementations.
//!
//! A store holds exactly one record per session: the bearer access token plus the CSRF
//! token and the instant it was acquired. Writes overwrite the previous value; there is
//! no history. Stores do not enforce mutual exclusion; the session's refresh gate is the
//! serialization point for CSRF exchanges.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by session credential stores.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns a snapshot of the current credentials.
	fn get(&self) -> StoreFuture<'_, Credentials>;

	/// Replaces the bearer access token.
	fn set_access_token(&self, token: TokenSecret) -> StoreFuture<'_, ()>;

	/// Replaces the CSRF token together with its acquisition instant.
	fn set_csrf(&self, token: TokenSecret, refreshed_at: OffsetDateTime) -> StoreFuture<'_, ()>;

	/// Removes every credential, returning the session to the anonymous state.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// CSRF token paired with the instant it was acquired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfCredential {
	/// Anti-forgery token value.
	pub token: TokenSecret,
	/// Wall-clock time of the acquisition.
	pub refreshed_at: OffsetDateTime,
}

/// Point-in-time view of a session's credentials.
///
/// The CSRF token and its timestamp live in one optional pair so one can never be
/// present without the other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
	/// Bearer access token, if the session is authenticated.
	pub access_token: Option<TokenSecret>,
	/// CSRF token and acquisition instant, if one has been obtained.
	pub csrf: Option<CsrfCredential>,
}
impl Credentials {
	/// Returns the CSRF token, if present.
	pub fn csrf_token(&self) -> Option<&TokenSecret> {
		self.csrf.as_ref().map(|csrf| &csrf.token)
	}

	/// Returns the CSRF acquisition instant, if present.
	pub fn csrf_refreshed_at(&self) -> Option<OffsetDateTime> {
		self.csrf.as_ref().map(|csrf| csrf.refreshed_at)
	}

	/// Returns `true` when no credential of any kind is held.
	pub fn is_anonymous(&self) -> bool {
		self.access_token.is_none() && self.csrf.is_none()
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
