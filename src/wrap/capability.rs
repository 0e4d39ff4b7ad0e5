use std::collections::BTreeSet;

use crate::error::RetryError;

/// A service whose retryable operations are declared up front.
///
/// Wrapping such a service without naming methods selects all of them.
/// Naming a method that is not declared here is rejected.
pub trait RetryCapability {
    /// Names of every operation the service exposes.
    const METHODS: &'static [&'static str];
}

/// Operations of a wrapped service that go through the retry engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodSelection {
    All,
    Only(BTreeSet<String>),
}

impl MethodSelection {
    pub fn only<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, method: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(method),
        }
    }

    /// Pins the selection to the `declared` operations.
    ///
    /// `All` expands to every declared name; an explicit list must name only
    /// declared operations.
    pub fn resolve(self, declared: &[&str]) -> Result<Self, RetryError> {
        match self {
            Self::All => Ok(Self::only(declared.iter().copied())),
            Self::Only(names) => {
                let unknown: Vec<&str> = names
                    .iter()
                    .map(String::as_str)
                    .filter(|name| !declared.contains(name))
                    .collect();
                if unknown.is_empty() {
                    Ok(Self::Only(names))
                } else {
                    Err(RetryError::InvalidConfig(format!(
                        "cannot wrap undeclared methods: {}",
                        unknown.join(", ")
                    )))
                }
            }
        }
    }
}
