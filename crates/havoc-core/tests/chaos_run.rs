//! End-to-end pipeline tests against the in-memory test system.
//!
//! Time-dependent runs execute under tokio's paused clock, so the
//! exponential validation backoff advances instantly while staying
//! deterministic relative to the healer task.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use havoc_audit::Outcome;
use havoc_core::test_support::{register_test_system, TestSystem};
use havoc_core::{ChaosMaker, Config, Hook};

const CHAOS_CONFIG: &str = r#"
systems:
  - name: testing
    type: test-system
    resources:
      - resource1
      - resource2
      - resource3
      - resource4
ready:
  after: 0s
destroy:
  exclusions:
    - system: testing
      resources:
        - resource1
    - system: testing
      resources:
        - resource2
        - resource3
  scenarios:
    - system: testing
      timeout: 5s
      resources:
        - resource2
    - system: testing
      timeout: 5s
      resources:
        - resource2
        - resource4
    - system: testing
      random: 2
      minResources: 1
      maxResources: 3
"#;

async fn parsed_config() -> Config {
    register_test_system();

    let mut config = Config::new();
    config.parse(CHAOS_CONFIG).await.unwrap();
    config
}

/// Spawns a task restoring the system's live state every 50 ms, simulating
/// a backend that self-heals after chaos.
fn spawn_healer(config: &Config) -> tokio::task::JoinHandle<()> {
    let system = config
        .system("testing")
        .unwrap()
        .as_any()
        .downcast::<TestSystem>()
        .unwrap();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(50));
        loop {
            interval.tick().await;
            system.heal();
        }
    })
}

/// The sorted identifier multiset recorded for one scenario, parsed back
/// out of the report's canonical multi-line form.
fn recorded_multiset(identifiers: &str) -> Vec<String> {
    let mut ids: Vec<String> = identifiers
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| line.trim_matches(&['{', '}'][..]).to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test(start_paused = true)]
async fn happy_path_executes_all_scenarios() {
    let config = parsed_config().await;
    let healer = spawn_healer(&config);

    let mut maker = ChaosMaker::new(config);
    maker.create_chaos(Hook::new()).await.unwrap();
    healer.abort();

    let reporter = &maker.reporter;
    assert_eq!(reporter.ready.message.result, Outcome::Success);
    assert_eq!(reporter.load.message.result, Outcome::Success);

    let scenarios = &reporter.scenarios.scenarios;
    assert_eq!(scenarios.len(), 4);
    for scenario in scenarios {
        assert_eq!(scenario.message.result, Outcome::Success);
    }

    // Predefined scenarios execute first, in declaration order.
    assert_eq!(recorded_multiset(&scenarios[0].identifiers), vec!["resource2"]);
    assert_eq!(
        recorded_multiset(&scenarios[1].identifiers),
        vec!["resource2", "resource4"]
    );

    // The random tail never repeats an exclusion, a predefined scenario or
    // itself, judged as identifier multisets.
    let forbidden: BTreeSet<Vec<String>> = [
        vec!["resource1".to_string()],
        vec!["resource2".to_string(), "resource3".to_string()],
        recorded_multiset(&scenarios[0].identifiers),
        recorded_multiset(&scenarios[1].identifiers),
    ]
    .into_iter()
    .collect();

    let third = recorded_multiset(&scenarios[2].identifiers);
    let fourth = recorded_multiset(&scenarios[3].identifiers);
    assert!(!forbidden.contains(&third));
    assert!(!forbidden.contains(&fourth));
    assert_ne!(third, fourth);

    // Terminal success entry.
    assert_eq!(reporter.miscellaneous.len(), 1);
    assert_eq!(reporter.miscellaneous[0].result, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn unrecoverable_system_fails_the_first_scenario() {
    // No healer: killed resources stay gone and validation can never pass.
    let config = parsed_config().await;

    let mut maker = ChaosMaker::new(config);
    let err = maker.create_chaos(Hook::new()).await.unwrap_err();
    assert!(err.to_string().contains("didn't reach desired state"));

    let reporter = &maker.reporter;
    assert_eq!(reporter.ready.message.result, Outcome::Success);
    assert_eq!(reporter.load.message.result, Outcome::Success);

    let scenarios = &reporter.scenarios.scenarios;
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].message.result, Outcome::Failure);

    // No terminal success entry on an aborted run.
    assert!(reporter
        .miscellaneous
        .iter()
        .all(|message| message.result != Outcome::Success));
}

#[tokio::test(start_paused = true)]
async fn hooks_run_in_phase_order() {
    let config = parsed_config().await;
    let healer = spawn_healer(&config);

    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    fn record(
        events: Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    ) -> impl Fn() -> std::future::Ready<anyhow::Result<()>> + Send + Sync + 'static {
        move || {
            events.lock().unwrap().push(label);
            std::future::ready(Ok(()))
        }
    }

    let hook = Hook::new()
        .with_pre_ready(record(events.clone(), "pre-ready"))
        .with_post_ready(record(events.clone(), "post-ready"))
        .with_pre_system_load(record(events.clone(), "pre-system-load"))
        .with_post_system_load(record(events.clone(), "post-system-load"))
        .with_pre_chaos(record(events.clone(), "pre-chaos"))
        .with_post_chaos(record(events.clone(), "post-chaos"));

    let mut maker = ChaosMaker::new(config);
    maker.create_chaos(hook).await.unwrap();
    healer.abort();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "pre-ready",
            "post-ready",
            "pre-system-load",
            "post-system-load",
            "pre-chaos",
            "post-chaos",
        ]
    );

    let reporter = &maker.reporter;
    assert_eq!(reporter.ready.pre_ready.result, Outcome::Success);
    assert_eq!(reporter.ready.post_ready.result, Outcome::Success);
    assert_eq!(reporter.load.pre_load.result, Outcome::Success);
    assert_eq!(reporter.load.post_load.result, Outcome::Success);
    assert_eq!(reporter.scenarios.pre_chaos_tests.result, Outcome::Success);
    assert_eq!(reporter.scenarios.post_chaos_tests.result, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn failing_hooks_are_recorded_but_do_not_halt() {
    let config = parsed_config().await;
    let healer = spawn_healer(&config);

    let hook = Hook::new()
        .with_pre_ready(|| std::future::ready(Err(anyhow::anyhow!("collector offline"))))
        .with_post_chaos(|| std::future::ready(Err(anyhow::anyhow!("collector offline"))));

    let mut maker = ChaosMaker::new(config);
    maker.create_chaos(hook).await.unwrap();
    healer.abort();

    let reporter = &maker.reporter;
    assert_eq!(reporter.ready.pre_ready.result, Outcome::Failure);
    assert!(reporter.ready.pre_ready.message.contains("collector offline"));
    assert_eq!(reporter.scenarios.post_chaos_tests.result, Outcome::Failure);

    // The run itself still succeeded end to end.
    assert_eq!(reporter.ready.message.result, Outcome::Success);
    assert_eq!(reporter.miscellaneous.last().unwrap().result, Outcome::Success);
}
