// self
use crate::{
	csrf::ResponseClass,
	obs::{OpKind, OpOutcome},
};

/// Counter incremented once per refresh or secure-request attempt, success, and failure.
pub const OP_TOTAL: &str = "session_broker_op_total";
/// Counter incremented once per response received for a wrapped request.
pub const RESPONSE_TOTAL: &str = "session_broker_response_total";

/// Counts an operation outcome, labeled by `op` and `outcome`.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(OP_TOTAL, "op" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Counts a wrapped response by its classification, so CSRF rejections that were later
/// recovered by a retry still show up.
pub fn record_response(class: ResponseClass) {
	#[cfg(feature = "metrics")]
	metrics::counter!(RESPONSE_TOTAL, "class" => class.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = class;
}
