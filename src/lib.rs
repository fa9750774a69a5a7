//! Session credential broker that keeps a bearer access token and an anti-forgery (CSRF) token
//! fresh, collapses concurrent refreshes into a single exchange, and transparently retries
//! requests the server rejects for CSRF reasons.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod csrf;
pub mod error;
pub mod freshness;
pub mod http;
pub mod obs;
pub mod session;
pub mod store;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use httpmock as _;
