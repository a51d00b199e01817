//! Per-render logging context carrying the optional trace identifier.

use tracing::Span;

/// Passed explicitly into the orchestrator and backends. Every log line emitted
/// while a render runs is recorded inside `span`, so the trace id travels with it.
#[derive(Debug, Clone)]
pub struct RenderContext {
    trace_id: Option<String>,
    span: Span,
}

impl RenderContext {
    pub fn new(trace_id: Option<String>) -> Self {
        let span = match trace_id.as_deref() {
            Some(id) => tracing::info_span!("render", trace_id = %id),
            None => tracing::info_span!("render", trace_id = tracing::field::Empty),
        };
        Self { trace_id, span }
    }

    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        Self::new(Some(trace_id.into()))
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_trace_id() {
        let ctx = RenderContext::with_trace_id("test-trace-123");
        assert_eq!(ctx.trace_id(), Some("test-trace-123"));
        assert!(RenderContext::default().trace_id().is_none());
    }
}
