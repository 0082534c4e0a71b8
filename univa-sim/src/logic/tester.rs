use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use univa_game::{Catalog, EconomyConfig};

use crate::logic::simulation::{SimulationSession, SimulationSummary};
use crate::scenarios::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    /// Summary of the last iteration played.
    pub last_summary: Option<SimulationSummary>,
}

pub struct LogicTester {
    catalog: Arc<Catalog>,
    config: EconomyConfig,
    verbose: bool,
}

impl LogicTester {
    #[must_use]
    pub const fn new(catalog: Arc<Catalog>, config: EconomyConfig, verbose: bool) -> Self {
        Self {
            catalog,
            config,
            verbose,
        }
    }

    #[must_use]
    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Testing scenario: {} (strategy: {} seed: {})",
                        scenario.name.bright_white(),
                        scenario.plan.strategy,
                        seed
                    );
                }
                self.run_single_scenario(scenario, seed, iterations)
            })
            .collect()
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut durations = Vec::with_capacity(iterations);
        let mut last_summary = None;

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let summary = SimulationSession::new(
                Arc::clone(&self.catalog),
                self.config.clone(),
                scenario.plan,
                iteration_seed,
            )
            .run();
            durations.push(start_time.elapsed());

            if let Some(err) = scenario.expect.evaluate(&summary) {
                failures.push(format!(
                    "Iteration {} (strategy {}, seed {}, clock {:.0}s, peak reach {:.3e}): {}",
                    i + 1,
                    summary.strategy,
                    summary.seed,
                    summary.clock,
                    summary.peak_reach,
                    err
                ));
                if self.verbose {
                    println!("  ❌ Iteration {}/{} failed: {}", i + 1, iterations, err.red());
                }
            } else {
                successes += 1;
                if self.verbose {
                    println!(
                        "  ✅ Iteration {}/{}: peak reach {:.3e}, {} evacuations",
                        i + 1,
                        iterations,
                        summary.peak_reach,
                        summary.events.evacuations
                    );
                }
            }
            last_summary = Some(summary);
        }

        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            last_summary,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::get_scenario;

    fn tester() -> LogicTester {
        LogicTester::new(univa_game::catalog(), EconomyConfig::default(), false)
    }

    #[test]
    fn smoke_passes_for_every_seed() {
        let scenario = get_scenario("smoke").unwrap();
        let results = tester().run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 2);
            assert!(result.last_summary.is_some());
        }
    }

    #[test]
    fn impossible_expectation_is_reported() {
        let mut scenario = get_scenario("smoke").unwrap();
        scenario.expect.min_evacuations = 1;
        let result = &tester().run_scenario(&scenario, &[5], 1)[0];
        assert!(!result.passed);
        assert!(result.failures[0].contains("evacuations"));
    }

    #[test]
    fn results_serialize_durations_as_millis() {
        let result = ScenarioResult {
            scenario_name: "smoke".into(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(1500),
            last_summary: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 1500);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.average_duration, Duration::from_millis(1500));
    }
}
