//! File-backed [`CredentialStore`] so a session survives process restarts.
//!
//! The snapshot is a flat JSON object keyed by `token`, `csrf_token`, and
//! `csrf_token_refreshed_at` (RFC 3339). It is rewritten atomically after every mutation.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialStore, Credentials, CsrfCredential, StoreError, StoreFuture},
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	token: Option<TokenSecret>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	csrf_token: Option<TokenSecret>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "time::serde::rfc3339::option"
	)]
	csrf_token_refreshed_at: Option<OffsetDateTime>,
}
impl From<&Credentials> for Snapshot {
	fn from(credentials: &Credentials) -> Self {
		Self {
			token: credentials.access_token.clone(),
			csrf_token: credentials.csrf_token().cloned(),
			csrf_token_refreshed_at: credentials.csrf_refreshed_at(),
		}
	}
}
impl From<Snapshot> for Credentials {
	fn from(snapshot: Snapshot) -> Self {
		// A token without its timestamp (or the reverse) is dropped as a whole.
		let csrf = match (snapshot.csrf_token, snapshot.csrf_token_refreshed_at) {
			(Some(token), Some(refreshed_at)) => Some(CsrfCredential { token, refreshed_at }),
			_ => None,
		};

		Self { access_token: snapshot.token, csrf }
	}
}

/// Persists the session record to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Credentials>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let credentials =
			if path.exists() { Self::load_snapshot(&path)? } else { Credentials::default() };

		Ok(Self { path, inner: Arc::new(RwLock::new(credentials)) })
	}

	/// Returns the path backing this store.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Credentials, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Credentials::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let snapshot: Snapshot =
			serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
				StoreError::Serialization {
					message: format!("Failed to parse {} at `{}`: {e}", path.display(), e.path()),
				}
			})?;

		Ok(snapshot.into())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Credentials) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&Snapshot::from(contents)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize credentials: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate(&self, apply: impl FnOnce(&mut Credentials)) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		apply(&mut guard);
		self.persist_locked(&guard)
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> StoreFuture<'_, Credentials> {
		Box::pin(async move { Ok(self.inner.read().clone()) })
	}

	fn set_access_token(&self, token: TokenSecret) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|credentials| credentials.access_token = Some(token)) })
	}

	fn set_csrf(&self, token: TokenSecret, refreshed_at: OffsetDateTime) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|credentials| {
				credentials.csrf = Some(CsrfCredential { token, refreshed_at })
			})
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|credentials| *credentials = Credentials::default()) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"session_broker_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn credentials_survive_reopen() {
		let path = temp_path("reopen");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let refreshed_at = time::macros::datetime!(2026-10-17 08:30:00 UTC);

		store
			.set_access_token("bearer-1".into())
			.await
			.expect("Access token write should succeed.");
		store.set_csrf("abc123".into(), refreshed_at).await.expect("CSRF write should succeed.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
		let credentials = reopened.get().await.expect("Reading the reopened store should succeed.");

		assert_eq!(credentials.access_token.as_ref().map(TokenSecret::expose), Some("bearer-1"));
		assert_eq!(credentials.csrf_token().map(TokenSecret::expose), Some("abc123"));
		assert_eq!(credentials.csrf_refreshed_at(), Some(refreshed_at));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn snapshot_uses_fixed_keys_and_clear_removes_them() {
		let path = temp_path("keys");
		let store = FileStore::open(&path).expect("Failed to open file store.");

		store
			.set_access_token("bearer-2".into())
			.await
			.expect("Access token write should succeed.");
		store
			.set_csrf("xyz789".into(), time::macros::datetime!(2026-10-17 09:00:00 UTC))
			.await
			.expect("CSRF write should succeed.");

		let raw: serde_json::Value =
			serde_json::from_slice(&fs::read(&path).expect("Snapshot file should exist."))
				.expect("Snapshot file should contain JSON.");

		assert_eq!(raw["token"], "bearer-2");
		assert_eq!(raw["csrf_token"], "xyz789");
		assert_eq!(raw["csrf_token_refreshed_at"], "2026-10-17T09:00:00Z");

		store.clear().await.expect("Clearing the store should succeed.");

		let raw: serde_json::Value =
			serde_json::from_slice(&fs::read(&path).expect("Snapshot file should exist."))
				.expect("Snapshot file should contain JSON.");

		assert_eq!(raw, serde_json::json!({}));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}

	#[test]
	fn csrf_token_without_timestamp_is_discarded() {
		let path = temp_path("orphan");

		fs::write(&path, br#"{"token":"bearer-3","csrf_token":"orphan"}"#)
			.expect("Failed to seed snapshot file.");

		let store = FileStore::open(&path).expect("Failed to open seeded file store.");
		let credentials = store.inner.read().clone();

		assert_eq!(credentials.access_token.as_ref().map(TokenSecret::expose), Some("bearer-3"));
		assert!(credentials.csrf.is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}

	#[test]
	fn malformed_snapshot_reports_path() {
		let path = temp_path("malformed");

		fs::write(&path, br#"{"csrf_token_refreshed_at":"yesterday"}"#)
			.expect("Failed to seed snapshot file.");

		let err = FileStore::open(&path).expect_err("Malformed timestamps should be rejected.");

		match err {
			StoreError::Serialization { message } =>
				assert!(message.contains("csrf_token_refreshed_at")),
			other => panic!("Unexpected store error: {other:?}."),
		}

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}
}
