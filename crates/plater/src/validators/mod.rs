//! Pluggable graph validators
//!
//! Validators are registered with the [`ValidatorRegistry`] and run at
//! startup when the operator asks for validation. The KGX shape checker
//! lives outside this crate; anything that can look at the graph and
//! answer "is this build sound" implements [`GraphValidator`].

pub mod build_compare;

pub use build_compare::BuildComparisonValidator;

use crate::error::Result;
use async_trait::async_trait;
use tracing::{error, info};

/// A check over the deployed graph
#[async_trait]
pub trait GraphValidator: Send + Sync {
    /// Name used in log records and reports
    fn name(&self) -> &'static str;

    /// Run the check. `Ok(false)` means the graph failed validation;
    /// errors mean the check itself could not run.
    async fn validate(&self) -> Result<bool>;
}

/// Ordered collection of validators, run until the first failure
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: Vec<Box<dyn GraphValidator>>,
}

impl ValidatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Box<dyn GraphValidator>) {
        self.validators.push(validator);
    }

    /// Run every registered validator; stops at the first failing one.
    pub async fn validate_all(&self) -> Result<bool> {
        for validator in &self.validators {
            let ok = validator.validate().await?;
            if !ok {
                error!(validator = validator.name(), "validation failed");
                return Ok(false);
            }
            info!(validator = validator.name(), "validation passed");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedValidator {
        name: &'static str,
        verdict: bool,
    }

    #[async_trait]
    impl GraphValidator for FixedValidator {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn validate(&self) -> Result<bool> {
            Ok(self.verdict)
        }
    }

    #[tokio::test]
    async fn test_empty_registry_passes() {
        let registry = ValidatorRegistry::new();
        assert!(registry.validate_all().await.expect("no validators"));
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_run() {
        let mut registry = ValidatorRegistry::new();
        registry.register(Box::new(FixedValidator { name: "ok", verdict: true }));
        registry.register(Box::new(FixedValidator { name: "bad", verdict: false }));
        assert!(!registry.validate_all().await.expect("validators ran"));
    }
}
