//! Call-scoped context passed through fit, predict, save and load.
//!
//! Logging goes through `tracing`; the context owns a span tagged with the
//! KPI name so every event a model emits is attributed to its KPI. The
//! crate never installs a subscriber; applications choose their own.

use tracing::Span;

/// Identity and logging span of one KPI run.
#[derive(Debug, Clone)]
pub struct RunContext {
    kpi: String,
    span: Span,
}

impl RunContext {
    /// Create a context for `kpi`.
    pub fn new(kpi: impl Into<String>) -> Self {
        let kpi = kpi.into();
        let span = tracing::info_span!("kpi", kpi = %kpi);
        Self { kpi, span }
    }

    /// Context for ad-hoc use outside a registered KPI.
    pub fn detached() -> Self {
        Self::new("adhoc")
    }

    pub fn kpi(&self) -> &str {
        &self.kpi
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` inside this context's span.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::detached()
    }
}
