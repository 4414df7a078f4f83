//! Route filters decide which of the items registered under one path takes a request.
//!
//! Patterns that only differ in parameter names or types share a router path, so the
//! router keeps every item for a path and asks their filters in registration order.

use crate::action::ParamKind;
use crate::request::{ActionRequest, RouteParams};

/// Core trait for route filtering.
///
/// The `Filter` trait requires `Send + Sync`, ensuring that filters
/// can be safely used in a multi-threaded environment.
pub trait Filter: Send + Sync {
    /// Check if the request matches this filter's criteria.
    fn matches(&self, req: &ActionRequest, params: &RouteParams) -> bool;
}

/// Creates a filter that always returns true.
pub fn true_filter() -> TrueFilter {
    TrueFilter
}

/// A filter that always returns true.
#[derive(Debug)]
pub struct TrueFilter;

impl Filter for TrueFilter {
    #[inline]
    fn matches(&self, _req: &ActionRequest, _params: &RouteParams) -> bool {
        true
    }
}

/// Creates a filter checking the type constraint of every captured parameter.
pub fn param_types<I, S>(params: I) -> ParamTypeFilter
where
    I: IntoIterator<Item = (S, ParamKind)>,
    S: Into<String>,
{
    ParamTypeFilter { params: params.into_iter().map(|(name, kind)| (name.into(), kind)).collect() }
}

/// A filter that matches when each named parameter satisfies its [`ParamKind`].
#[derive(Debug)]
pub struct ParamTypeFilter {
    params: Vec<(String, ParamKind)>,
}

impl Filter for ParamTypeFilter {
    fn matches(&self, _req: &ActionRequest, params: &RouteParams) -> bool {
        self.params.iter().all(|(name, kind)| params.get(name).is_some_and(|value| kind.matches(value)))
    }
}
