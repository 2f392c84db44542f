//! Per-system chaos scenario computation.
//!
//! A [`ScenarioProvider`] owns everything the `destroy` section declared for
//! one system: exclusions, predefined scenarios and the random-scenario
//! parameters. The full scenario sequence is computed once, lazily, on the
//! first call to [`ScenarioProvider::next_scenario`]; predefined scenarios
//! come first in declaration order, random scenarios follow in generation
//! order.

use std::collections::{HashSet, VecDeque};
use std::hash::Hasher;
use std::time::Duration;

use fnv::FnvHasher;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::identifier::Identifiers;
use crate::system::System;

/// Upper bound on cumulative collisions with the forbidden set while
/// generating random scenarios.
const MAX_TOTAL_CLASHES: usize = 10;

/// Errors produced while computing scenarios.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("too many clashes with exclusions while generating random scenarios")]
    TooManyClashes,

    #[error("system has no identifiers to build random scenarios from")]
    NoIdentifiers,
}

/// One chaos scenario: the identifiers to destroy and how long the system
/// gets to self-heal afterwards. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Scenario {
    identifiers: Identifiers,
    timeout: Duration,
}

impl Scenario {
    pub(crate) fn new(identifiers: Identifiers, timeout: Duration) -> Self {
        Self {
            identifiers,
            timeout,
        }
    }

    pub fn identifiers(&self) -> &Identifiers {
        &self.identifiers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Holds the declared scenario inputs for one system and hands out the
/// computed sequence one scenario at a time.
#[derive(Default)]
pub(crate) struct ScenarioProvider {
    pub(crate) exclusions: Vec<Identifiers>,
    pub(crate) predefined_scenarios: Vec<Scenario>,
    pub(crate) random_timeout: Duration,
    pub(crate) random: i64,
    pub(crate) min_resources: i64,
    pub(crate) max_resources: i64,
    computed: Option<VecDeque<Scenario>>,
}

impl ScenarioProvider {
    /// Returns the next scenario to execute, or `None` once the computed
    /// sequence is exhausted. The sequence is expanded exactly once, on the
    /// first call.
    pub(crate) fn next_scenario(
        &mut self,
        system: &dyn System,
    ) -> Result<Option<Scenario>, ScenarioError> {
        if self.computed.is_none() {
            self.computed = Some(self.compute(system)?);
        }

        let Some(scenarios) = self.computed.as_mut() else {
            return Ok(None);
        };

        Ok(scenarios.pop_front())
    }

    fn compute(&self, system: &dyn System) -> Result<VecDeque<Scenario>, ScenarioError> {
        let mut computed: VecDeque<Scenario> = self.predefined_scenarios.iter().cloned().collect();

        if self.random <= 0 {
            return Ok(computed);
        }

        // Random scenarios must not repeat an exclusion, a predefined
        // scenario, or each other, where repetition is judged on the
        // order-insensitive hash of the identifier set.
        let mut forbidden: HashSet<String> = self
            .exclusions
            .iter()
            .map(identifiers_hash)
            .chain(
                self.predefined_scenarios
                    .iter()
                    .map(|scenario| identifiers_hash(&scenario.identifiers)),
            )
            .collect();

        let all_identifiers = system.identifiers();
        if all_identifiers.is_empty() {
            return Err(ScenarioError::NoIdentifiers);
        }

        let mut rng = rand::thread_rng();
        let mut total_clashes = 0;
        let mut accepted = 0;

        while accepted < self.random {
            let count = rng.gen_range(self.min_resources..self.max_resources);

            // Sampling is with replacement: the same identifier may appear
            // more than once within a single scenario.
            let identifiers: Identifiers = (0..count)
                .map(|_| {
                    let index = rng.gen_range(0..all_identifiers.len());
                    all_identifiers.as_slice()[index].clone()
                })
                .collect();

            let hash = identifiers_hash(&identifiers);
            if forbidden.contains(&hash) {
                total_clashes += 1;
                debug!(clashes = total_clashes, "random scenario clashed with forbidden set");
                if total_clashes == MAX_TOTAL_CLASHES {
                    return Err(ScenarioError::TooManyClashes);
                }
                continue;
            }

            forbidden.insert(hash);
            computed.push_back(Scenario::new(identifiers, self.random_timeout));
            accepted += 1;
        }

        Ok(computed)
    }
}

/// Order-insensitive hash of an identifier group: IDs are sorted
/// lexicographically and concatenated before hashing, so any permutation of
/// the same multiset yields the same value. 64-bit FNV-1a, formatted as a
/// decimal string.
pub(crate) fn identifiers_hash(identifiers: &Identifiers) -> String {
    let mut ids: Vec<String> = identifiers
        .iter()
        .map(|identifier| identifier.id().to_string())
        .collect();
    ids.sort_unstable();

    let mut hasher = FnvHasher::default();
    hasher.write(ids.concat().as_bytes());

    hasher.finish().to_string()
}
