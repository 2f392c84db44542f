//! Bundled ready conditions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_yaml::Mapping;

use crate::config::{duration_from_value, Config};
use crate::system::{ReadyCondition, ReadyParser};

/// Ready-section kind handled by [`AfterParser`].
pub const AFTER_READY_KIND: &str = "after";

/// The simplest ready condition: sleep for a fixed duration, then report
/// ready.
#[derive(Debug)]
pub struct After {
    duration: Duration,
}

impl After {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl ReadyCondition for After {
    async fn ready(&self) -> Result<bool> {
        tokio::time::sleep(self.duration).await;
        Ok(true)
    }
}

/// Combines multiple ready conditions; ready only when every inner
/// condition is ready. The first error or not-ready answer short-circuits.
#[derive(Debug)]
pub struct AllReady {
    conditions: Vec<Arc<dyn ReadyCondition>>,
}

impl AllReady {
    pub fn new(conditions: Vec<Arc<dyn ReadyCondition>>) -> Self {
        Self { conditions }
    }
}

#[async_trait]
impl ReadyCondition for AllReady {
    async fn ready(&self) -> Result<bool> {
        for condition in &self.conditions {
            if !condition.ready().await? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Parses `ready: { after: <duration> }` into an [`After`] condition.
pub struct AfterParser;

impl ReadyParser for AfterParser {
    fn parse(&self, _config: &Config, ready_section: &Mapping) -> Result<Arc<dyn ReadyCondition>> {
        let value = ready_section
            .get(AFTER_READY_KIND)
            .with_context(|| format!("'{AFTER_READY_KIND}' field is not defined"))?;

        let duration = duration_from_value(AFTER_READY_KIND, value)?;

        Ok(Arc::new(After::new(duration)))
    }
}
