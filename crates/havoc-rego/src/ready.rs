//! The policy-evaluating ready condition.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use havoc_core::{ReadyCondition, System};
use tracing::debug;

/// Readiness check backed by a Rego policy: the observed system's state is
/// the policy input, the query must bind one boolean.
pub struct RegoReady {
    query: String,
    policy: String,
    system: Arc<dyn System>,
}

impl std::fmt::Debug for RegoReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegoReady")
            .field("query", &self.query)
            .field("policy", &self.policy)
            .finish()
    }
}

impl RegoReady {
    pub fn new(query: impl Into<String>, policy: impl Into<String>, system: Arc<dyn System>) -> Self {
        Self {
            query: query.into(),
            policy: policy.into(),
            system,
        }
    }

    /// Evaluates the policy against the given state document. Kept
    /// synchronous: evaluator values are not `Send`, so none of them may
    /// live across a suspension point.
    fn evaluate(&self, state_json: &[u8]) -> Result<bool> {
        let input = regorus::Value::from_json_str(
            std::str::from_utf8(state_json).context("system state is not valid utf-8")?,
        )
        .context("failed to parse system state json")?;

        let mut engine = regorus::Engine::new();
        engine
            .add_policy("policy.rego".to_string(), self.policy.clone())
            .context("failed to compile rego policy")?;
        engine.set_input(input);

        let results = engine
            .eval_query(self.query.clone(), false)
            .context("failed to evaluate rego query")?;

        if results.result.len() != 1 {
            return Err(anyhow!("rego evaluation returned no result for ready check"));
        }

        let bindings = match &results.result[0].bindings {
            regorus::Value::Object(bindings) => bindings,
            _ => return Err(anyhow!("rego evaluation returned no result for ready check")),
        };

        let mut values = bindings.values();
        let (Some(value), None) = (values.next(), values.next()) else {
            return Err(anyhow!(
                "rego evaluation must bind exactly one value for ready check"
            ));
        };

        match value {
            regorus::Value::Bool(ready) => {
                debug!(ready = *ready, "rego policy evaluated");
                Ok(*ready)
            }
            _ => Err(anyhow!(
                "rego evaluation returned non boolean type for ready check"
            )),
        }
    }
}

#[async_trait]
impl ReadyCondition for RegoReady {
    async fn ready(&self) -> Result<bool> {
        let state_json = self
            .system
            .as_json(true)
            .await
            .context("failed to get system state")?;

        self.evaluate(&state_json)
    }
}
