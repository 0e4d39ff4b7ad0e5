use std::fmt::Display;
use std::future::Future;

use crate::{config::RetryConfig, error::RetryError, operation::RetryOperation};

use super::capability::{MethodSelection, RetryCapability};

/// Wrapper that runs selected operations of `inner` through a fresh
/// [`RetryOperation`] on every call.
///
/// Implement the service's own trait for `Retrying<S>` and forward each
/// method through [`Retrying::call`].
pub struct Retrying<S> {
    inner: S,
    config: RetryConfig,
    methods: MethodSelection,
}

impl<S: RetryCapability> Retrying<S> {
    /// Wraps every operation listed in [`RetryCapability::METHODS`].
    pub fn new(inner: S, config: RetryConfig) -> Result<Self, RetryError> {
        Self::with_selection(inner, config, MethodSelection::All)
    }

    /// Wraps only the named operations; the rest run once. Every name must
    /// appear in [`RetryCapability::METHODS`].
    pub fn with_methods<I, N>(inner: S, config: RetryConfig, methods: I) -> Result<Self, RetryError>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self::with_selection(inner, config, MethodSelection::only(methods))
    }

    pub fn with_selection(
        inner: S,
        config: RetryConfig,
        methods: MethodSelection,
    ) -> Result<Self, RetryError> {
        config.validate()?;
        let methods = methods.resolve(S::METHODS)?;
        log::debug!("wrapping methods {methods:?}");
        Ok(Self {
            inner,
            config,
            methods,
        })
    }
}

impl<S> Retrying<S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn methods(&self) -> &MethodSelection {
        &self.methods
    }

    pub fn is_wrapped(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Invokes `method` through `f`, retrying failures when it is selected.
    ///
    /// Once retries are exhausted the caller receives the operation's main
    /// error instead of the last one.
    pub async fn call<'s, T, E, F, Fut>(&'s self, method: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut(&'s S) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Clone + Display + Send + 'static,
    {
        if !self.methods.contains(method) {
            return f(&self.inner).await;
        }

        let op = RetryOperation::from_validated(&self.config);
        let inner = &self.inner;
        let result = op
            .run(|attempt, _cancel| {
                if attempt == 1 {
                    log::debug!("first attempt: {method}");
                } else {
                    log::debug!("retrying: {method} (attempt {attempt})");
                }
                f(inner)
            })
            .await;

        match &result {
            Ok(_) => log::debug!("success: {method}"),
            Err(err) => log::debug!("error: {method}: {err}"),
        }
        result
    }
}
