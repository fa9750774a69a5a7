// self
use crate::{_prelude::*, csrf::ResponseClass, obs::OpKind};

/// Future returned by [`OpSpan::instrument`]; a passthrough when tracing is disabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; a passthrough when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span covering one refresh or one secure request.
///
/// The `attempts` and `class` fields start empty and are filled in as the executor
/// progresses, so the closed span reports how many sends a request took and how the last
/// response was classified.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a `session_broker.op` span for `kind`, tagged with the call-site `stage`.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"session_broker.op",
				op = kind.as_str(),
				stage,
				attempts = tracing::field::Empty,
				class = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records how many times the wrapped request has been sent so far.
	pub fn record_attempts(&self, attempts: u32) {
		#[cfg(feature = "tracing")]
		self.span.record("attempts", attempts);
		#[cfg(not(feature = "tracing"))]
		let _ = attempts;
	}

	/// Records the classification of the latest response.
	pub fn record_class(&self, class: ResponseClass) {
		#[cfg(feature = "tracing")]
		self.span.record("class", class.as_str());
		#[cfg(not(feature = "tracing"))]
		let _ = class;
	}

	/// Runs `fut` inside the span without holding an entered guard across `.await`.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
