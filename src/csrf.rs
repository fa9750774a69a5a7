//! CSRF wire conventions: where tokens travel and how rejections are recognized.

// crates.io
use ::http::{HeaderName, StatusCode};
// self
use crate::{_prelude::*, auth::TokenSecret, http::HttpResponse};

/// Header carrying the CSRF token in both directions.
pub const DEFAULT_CSRF_HEADER: &str = "x-csrf-token";
/// JSON body fields consulted when a response carries no CSRF header.
pub const DEFAULT_BODY_FIELDS: [&str; 2] = ["csrf_token", "csrfToken"];
/// Body fragments that mark a `403` as a CSRF rejection rather than a permission error.
pub const DEFAULT_REJECTION_SIGNATURES: [&str; 3] =
	["CSRF token is invalid or expired", "CSRF token missing", "Invalid CSRF token"];

/// Classification of a wrapped request's response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseClass {
	/// 2xx response.
	Success,
	/// `404`; not a credential problem and never retried.
	NotFound,
	/// `403` whose body matches a CSRF rejection signature; retryable.
	CsrfRejected,
	/// Any other status, including unrelated `403`s; returned for the caller to interpret.
	Other,
}
impl ResponseClass {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ResponseClass::Success => "success",
			ResponseClass::NotFound => "not_found",
			ResponseClass::CsrfRejected => "csrf_rejected",
			ResponseClass::Other => "other",
		}
	}
}
impl Display for ResponseClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Header name, body fallback fields, and rejection signatures used by a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfProtocol {
	/// Header used to send and receive the CSRF token.
	pub header: HeaderName,
	/// Top-level JSON fields checked, in order, when the header is absent.
	pub body_fields: Vec<String>,
	/// Body fragments identifying a CSRF-specific `403`.
	pub rejection_signatures: Vec<String>,
}
impl CsrfProtocol {
	/// Extracts a CSRF token from `response`.
	///
	/// The header is authoritative; the JSON body is only consulted when the header is
	/// missing or blank.
	pub fn extract(&self, response: &HttpResponse) -> Option<TokenSecret> {
		self.header_token(response).or_else(|| self.body_token(response))
	}

	/// Classifies a wrapped request's response.
	pub fn classify(&self, response: &HttpResponse) -> ResponseClass {
		match response.status {
			StatusCode::NOT_FOUND => ResponseClass::NotFound,
			StatusCode::FORBIDDEN if self.is_csrf_rejection(response) =>
				ResponseClass::CsrfRejected,
			status if status.is_success() => ResponseClass::Success,
			_ => ResponseClass::Other,
		}
	}

	fn header_token(&self, response: &HttpResponse) -> Option<TokenSecret> {
		let raw = response.headers.get(&self.header)?.to_str().ok()?.trim();

		if raw.is_empty() { None } else { Some(TokenSecret::new(raw)) }
	}

	fn body_token(&self, response: &HttpResponse) -> Option<TokenSecret> {
		if response.body.is_empty() {
			return None;
		}

		let payload = response.json::<serde_json::Value>().ok()?;
		let object = payload.as_object()?;

		self.body_fields
			.iter()
			.filter_map(|field| object.get(field)?.as_str())
			.map(str::trim)
			.find(|value| !value.is_empty())
			.map(TokenSecret::new)
	}

	fn is_csrf_rejection(&self, response: &HttpResponse) -> bool {
		let body = response.text();

		self.rejection_signatures.iter().any(|signature| body.contains(signature.as_str()))
	}
}
impl Default for CsrfProtocol {
	fn default() -> Self {
		Self {
			header: HeaderName::from_static(DEFAULT_CSRF_HEADER),
			body_fields: DEFAULT_BODY_FIELDS.iter().map(|field| field.to_string()).collect(),
			rejection_signatures: DEFAULT_REJECTION_SIGNATURES
				.iter()
				.map(|signature| signature.to_string())
				.collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use ::http::HeaderValue;
	// self
	use super::*;

	fn csrf_header() -> HeaderName {
		HeaderName::from_static(DEFAULT_CSRF_HEADER)
	}

	fn response(status: u16, body: &str) -> HttpResponse {
		HttpResponse::new(
			StatusCode::from_u16(status).expect("Fixture status should be valid."),
			body.as_bytes().to_vec(),
		)
	}

	#[test]
	fn header_wins_over_body() {
		let protocol = CsrfProtocol::default();
		let response = response(200, r#"{"csrf_token":"from-body"}"#)
			.with_header(csrf_header(), HeaderValue::from_static("from-header"));

		let token = protocol.extract(&response).expect("Header token should be extracted.");

		assert_eq!(token.expose(), "from-header");
	}

	#[test]
	fn body_fields_are_a_fallback() {
		let protocol = CsrfProtocol::default();

		assert_eq!(
			protocol
				.extract(&response(200, r#"{"csrfToken":"camel"}"#))
				.as_ref()
				.map(TokenSecret::expose),
			Some("camel"),
		);
		assert!(protocol.extract(&response(200, "<html></html>")).is_none());
		assert!(protocol.extract(&response(200, r#"{"csrf_token":""}"#)).is_none());
		assert!(protocol.extract(&response(204, "")).is_none());
	}

	#[test]
	fn blank_header_falls_back_to_body() {
		let protocol = CsrfProtocol::default();
		let response = response(200, r#"{"csrf_token":"body-token"}"#)
			.with_header(csrf_header(), HeaderValue::from_static(" "));

		let token = protocol.extract(&response).expect("Body token should be extracted.");

		assert_eq!(token.expose(), "body-token");
	}

	#[test]
	fn classifies_csrf_rejections_only_on_403_signatures() {
		let protocol = CsrfProtocol::default();

		assert_eq!(
			protocol.classify(&response(403, r#"{"message":"CSRF token is invalid or expired"}"#)),
			ResponseClass::CsrfRejected,
		);
		let cases = [
			(403, "CSRF token missing", ResponseClass::CsrfRejected),
			(403, "Invalid CSRF token", ResponseClass::CsrfRejected),
			(403, "Insufficient role", ResponseClass::Other),
			(400, "Invalid CSRF token", ResponseClass::Other),
			(404, "Invalid CSRF token", ResponseClass::NotFound),
			(201, "", ResponseClass::Success),
		];

		for (status, body, expected) in cases {
			assert_eq!(protocol.classify(&response(status, body)), expected, "status {status}");
		}
	}
}
