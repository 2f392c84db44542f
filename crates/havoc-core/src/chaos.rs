//! The chaos execution pipeline.
//!
//! [`ChaosMaker`] drives a run through its phases: wait for the configured
//! ready condition, capture every system's desired state, then execute the
//! scenario sequence of each system, waiting with backoff for the system to
//! self-heal after every kill. Any phase or scenario failure aborts the
//! whole run; the chaos surface is cumulative, so a failed recovery would
//! contaminate every later scenario.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use havoc_audit::{Message, Reporter, ScenarioRecord};
use havoc_wait::{execute_with_backoff, ExponentialBackoff};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::hooks::{Hook, HookFn};
use crate::registry;

/// Executes the chaos scenarios described by a [`Config`], recording every
/// phase into the [`Reporter`].
pub struct ChaosMaker {
    pub config: Config,
    pub reporter: Reporter,
}

impl ChaosMaker {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            reporter: Reporter::default(),
        }
    }

    /// Runs the full pipeline. Returns an error as soon as any phase or
    /// scenario fails; on success a terminal entry is appended to the
    /// report's miscellaneous section.
    pub async fn create_chaos(&mut self, hook: Hook) -> Result<()> {
        self.ready_check(&hook).await?;
        self.load_systems(&hook).await?;

        if let Some(message) = run_hook(hook.pre_chaos.as_ref(), "pre chaos test").await {
            self.reporter.scenarios.pre_chaos_tests = message;
        }

        let outcome = self.run_scenarios().await;

        if let Some(message) = run_hook(hook.post_chaos.as_ref(), "post chaos test").await {
            self.reporter.scenarios.post_chaos_tests = message;
        }

        outcome?;

        self.reporter
            .miscellaneous
            .push(Message::success("Successfully executed all scenarios"));

        Ok(())
    }

    async fn ready_check(&mut self, hook: &Hook) -> Result<()> {
        if let Some(message) = run_hook(hook.pre_ready.as_ref(), "pre ready").await {
            self.reporter.ready.pre_ready = message;
        }

        let outcome = self.ready_body().await;

        if let Some(message) = run_hook(hook.post_ready.as_ref(), "post ready").await {
            self.reporter.ready.post_ready = message;
        }

        outcome
    }

    async fn ready_body(&mut self) -> Result<()> {
        info!("initiating readiness check");

        let ready = self
            .config
            .ready
            .clone()
            .context("no ready condition configured")?;

        let mut backoff = ExponentialBackoff {
            duration: Duration::from_secs(1),
            cap: Duration::from_secs(10 * 60),
            factor: 1.5,
            jitter: 0.7,
        };

        let outcome = execute_with_backoff(
            &mut backoff,
            || {
                let ready = ready.clone();
                async move { ready.ready().await }
            },
            self.config.ready_timeout,
        )
        .await;

        match outcome {
            Err(err) => {
                let message = format!("system(s) failed to reach ready state: {err:#}");
                self.reporter.ready.message = Message::failure(message.clone());
                error!("{message}");
                Err(err.context("system(s) failed to reach ready state"))
            }
            Ok(false) => {
                let message = "system(s) didn't reach ready state";
                self.reporter.ready.message = Message::failure(message);
                error!("{message}");
                Err(anyhow!(message))
            }
            Ok(true) => {
                self.reporter.ready.message =
                    Message::success("Successfully completed ready phase");
                info!("system(s) are ready for chaos testing");
                Ok(())
            }
        }
    }

    async fn load_systems(&mut self, hook: &Hook) -> Result<()> {
        if let Some(message) = run_hook(hook.pre_system_load.as_ref(), "pre system load").await {
            self.reporter.load.pre_load = message;
        }

        let outcome = self.load_body().await;

        if let Some(message) = run_hook(hook.post_system_load.as_ref(), "post system load").await {
            self.reporter.load.post_load = message;
        }

        outcome
    }

    async fn load_body(&mut self) -> Result<()> {
        info!("system(s) are being loaded");

        for (name, system) in &self.config.systems {
            if let Err(err) = system.load().await {
                let message = format!("system '{name}' failed to load: {err:#}");
                self.reporter.load.message = Message::failure(message.clone());
                error!("{message}");
                return Err(err.context(format!("system '{name}' failed to load")));
            }
        }

        self.reporter.load.message = Message::success("system(s) are loaded successfully");
        info!("system(s) are loaded");

        Ok(())
    }

    async fn run_scenarios(&mut self) -> Result<()> {
        let system_names: Vec<String> = self.config.scenario_providers.keys().cloned().collect();

        for system_name in system_names {
            info!(system = %system_name, "creating chaos in system");

            let system_type = self
                .config
                .system_types
                .get(&system_name)
                .cloned()
                .with_context(|| format!("no type recorded for system '{system_name}'"))?;
            let system = self
                .config
                .systems
                .get(&system_name)
                .cloned()
                .with_context(|| format!("system '{system_name}' is not defined"))?;

            let killer_ctor = registry::killer_ctor(&system_type).with_context(|| {
                let message = format!(
                    "no killer registered for system '{system_name}' of type '{system_type}'"
                );
                error!("{message}");
                message
            })?;

            let killer = killer_ctor(system.clone()).with_context(|| {
                let message = format!(
                    "failed to create killer for system '{system_name}' of type '{system_type}'"
                );
                error!("{message}");
                message
            })?;

            loop {
                let next = self
                    .config
                    .scenario_providers
                    .get_mut(&system_name)
                    .and_then(|provider| provider.next_scenario(system.as_ref()).transpose());

                let scenario = match next {
                    None => break,
                    Some(Err(err)) => {
                        self.reporter.miscellaneous.push(Message::failure(format!(
                            "failed to generate scenario: {err}"
                        )));
                        return Err(err).context("failed to generate scenario");
                    }
                    Some(Ok(scenario)) => scenario,
                };

                let identifiers = scenario.identifiers();
                info!("creating chaos by action:\n{identifiers}");

                if let Err(err) = killer.kill(identifiers).await {
                    let message = format!(
                        "failed to kill identifiers for system '{system_name}' \
                         of type '{system_type}': {err:#}"
                    );
                    self.record_scenario_failure(identifiers.to_string(), &message);
                    error!("{message}");
                    return Err(err.context(format!(
                        "failed to kill identifiers for system '{system_name}' of type '{system_type}'"
                    )));
                }

                let mut backoff = ExponentialBackoff {
                    cap: Duration::from_secs(10 * 60),
                    factor: 2.0,
                    jitter: 0.3,
                    ..Default::default()
                };

                let validated = execute_with_backoff(
                    &mut backoff,
                    || {
                        let system = system.clone();
                        async move { system.validate().await }
                    },
                    scenario.timeout(),
                )
                .await;

                match validated {
                    Err(err) => {
                        let message =
                            format!("failed to validate system '{system_name}': {err:#}");
                        self.record_scenario_failure(identifiers.to_string(), &message);
                        error!("{message}");
                        return Err(
                            err.context(format!("failed to validate system '{system_name}'"))
                        );
                    }
                    Ok(false) => {
                        let message = format!(
                            "validation failed. system '{system_name}' didn't reach desired state"
                        );
                        self.record_scenario_failure(identifiers.to_string(), &message);
                        error!("{message}");
                        return Err(anyhow!(message));
                    }
                    Ok(true) => {
                        self.reporter.scenarios.scenarios.push(ScenarioRecord {
                            identifiers: identifiers.to_string(),
                            message: Message::success("Successfully executed the scenario"),
                        });
                        info!("recovered successfully from chaos by action:\n{identifiers}");
                    }
                }
            }
        }

        Ok(())
    }

    fn record_scenario_failure(&mut self, identifiers: String, message: &str) {
        self.reporter.scenarios.scenarios.push(ScenarioRecord {
            identifiers,
            message: Message::failure(message),
        });
    }
}

/// Invokes an optional hook and turns its outcome into a report entry.
/// Returns `None` when the hook is not configured. Hook failures are logged
/// and recorded but never halt the run.
async fn run_hook(hook_fn: Option<&HookFn>, label: &str) -> Option<Message> {
    let hook_fn = hook_fn?;

    info!("{label} hook executing");

    match hook_fn().await {
        Ok(()) => Some(Message::success(format!(
            "Successfully completed {label} hook"
        ))),
        Err(err) => {
            warn!("{label} hook failed: {err:#}");
            Some(Message::failure(format!("{label} hook failed: {err:#}")))
        }
    }
}
