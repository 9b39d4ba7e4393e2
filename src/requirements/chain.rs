//! Ordered, fail-fast requirement evaluation.

use tracing::{debug, warn};

use crate::error::Result;

use super::requirement::{Requirement, RequirementContext};

/// Requirements for one command, evaluated in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementChain {
    requirements: Vec<Requirement>,
}

impl RequirementChain {
    /// Creates an empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requirements: Vec::new(),
        }
    }

    /// Appends a requirement.
    #[must_use]
    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Returns the requirements in evaluation order.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Returns true if the chain has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluates every requirement in order, stopping at the first failure.
    ///
    /// Requirements after a failing one are never evaluated. On success the
    /// warnings produced along the way are returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing requirement's error.
    pub async fn execute(&self, ctx: &RequirementContext<'_>) -> Result<Vec<String>> {
        debug!("Checking {} requirement(s)", self.requirements.len());
        let mut warnings = Vec::new();

        for requirement in &self.requirements {
            if let Some(warning) = requirement.evaluate(ctx).await? {
                warn!("{warning}");
                warnings.push(warning);
            }
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Session;
    use crate::error::{PushError, RequirementKind};
    use crate::remote::{MockRemoteClient, RetryPolicy};

    #[tokio::test]
    async fn test_fail_fast_skips_later_requirements() {
        let session = Session::default();
        // Any find_app call would fail the test.
        let client = MockRemoteClient::new();
        let ctx = RequirementContext::online(&session, &client, RetryPolicy::none());

        let chain = RequirementChain::new()
            .with(Requirement::LoggedIn)
            .with(Requirement::ApplicationExists {
                name: String::from("web"),
            });

        match chain.execute(&ctx).await {
            Err(PushError::Requirement(e)) => assert_eq!(e.kind, RequirementKind::NotLoggedIn),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        let session = Session::default();
        let ctx = RequirementContext::offline(&session);

        let chain = RequirementChain::new()
            .with(Requirement::ApiEndpointSet)
            .with(Requirement::LoggedIn);

        let err = chain.execute(&ctx).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No API endpoint set. Use 'cfpush api' to set an endpoint"
        );
    }

    #[tokio::test]
    async fn test_success_collects_warnings() {
        let session = Session::default();
        let ctx = RequirementContext::offline(&session);

        let chain = RequirementChain::new()
            .with(Requirement::DeprecatedUsage {
                message: String::from("first"),
                triggered: true,
            })
            .with(Requirement::DeprecatedUsage {
                message: String::from("second"),
                triggered: false,
            });

        assert_eq!(chain.execute(&ctx).await.unwrap(), vec![String::from("first")]);
        assert!(RequirementChain::new().execute(&ctx).await.unwrap().is_empty());
    }
}
