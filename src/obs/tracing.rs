// self
use crate::{_prelude::*, obs::Component};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type Instrumented<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type Instrumented<F> = F;

/// A span wrapper used around component operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided component + operation.
	pub fn new(component: Component, op: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("microauth.op", component = component.as_str(), op);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (component, op);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
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

/// Records a refused request or token at debug level; the cause stays out of client responses.
pub fn log_rejection(component: Component, cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(component = component.as_str(), %cause, "rejected");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (component, cause);
	}
}

/// Records the result of one sweep pass.
pub fn log_sweep(task: &str, removed: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(task, removed, "sweep completed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (task, removed);
	}
}

/// Records a failed sweep pass; the task keeps running.
pub fn log_sweep_failure(task: &str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(task, %error, "sweep failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (task, error);
	}
}

/// Records how a background task ended.
pub fn log_shutdown(task: &str, graceful: bool) {
	#[cfg(feature = "tracing")]
	{
		if graceful {
			tracing::info!(task, "background task closed gracefully");
		} else {
			tracing::warn!(task, "background task forced closed after deadline");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (task, graceful);
	}
}
