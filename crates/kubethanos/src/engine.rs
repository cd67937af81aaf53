//! Victim selection and the per-cycle kill pass.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{CycleError, SelectError, TerminationFailures};
use crate::executor::TerminationExecutor;
use crate::filter::{filter_by_namespaces, filter_terminating};
use crate::instance::Instance;
use crate::sampler::random_sample;
use crate::selector::ScopeSelector;
use crate::store::InstanceStore;

/// Result of victim selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Nothing survived the filters; the cycle has nothing to do.
    NoCandidates,
    Victims {
        candidates: usize,
        victims: Vec<Instance>,
    },
}

/// list -> scope filter -> liveness filter -> sample.
pub struct SelectionEngine {
    store: Arc<dyn InstanceStore>,
    scope: ScopeSelector,
    kill_fraction: f64,
    rng: Mutex<StdRng>,
}

impl SelectionEngine {
    pub fn new(store: Arc<dyn InstanceStore>, scope: ScopeSelector, kill_fraction: f64) -> Self {
        Self {
            store,
            scope,
            kill_fraction,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, e.g. with a seeded generator.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn scope(&self) -> &ScopeSelector {
        &self.scope
    }

    pub fn kill_fraction(&self) -> f64 {
        self.kill_fraction
    }

    /// Current candidates: every listed pod in scope that is not terminating.
    pub async fn select_candidates(&self) -> Result<Vec<Instance>, SelectError> {
        let all = self
            .store
            .list(&self.scope)
            .await
            .map_err(SelectError::List)?;

        let scoped = filter_by_namespaces(&all, &self.scope)?;
        Ok(filter_terminating(&scoped))
    }

    pub async fn select_victims(&self) -> Result<Selection, SelectError> {
        let candidates = self.select_candidates().await?;
        if candidates.is_empty() {
            return Ok(Selection::NoCandidates);
        }

        info!(size = candidates.len(), "Total pods");

        let victims = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            random_sample(&candidates, self.kill_fraction, &mut *rng)
        };

        info!(size = victims.len(), "Pods to kill");

        Ok(Selection::Victims {
            candidates: candidates.len(),
            victims,
        })
    }
}

/// Summary of a cycle in which every victim was handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    pub victims: Vec<String>,
    pub dry_run: bool,
}

impl CycleReport {
    pub fn no_candidates(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }
}

/// One selection followed by sequential termination of every victim.
pub struct ChaosEngine {
    selection: SelectionEngine,
    executor: TerminationExecutor,
}

impl ChaosEngine {
    pub fn new(selection: SelectionEngine, executor: TerminationExecutor) -> Self {
        Self {
            selection,
            executor,
        }
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    /// Run one cycle.
    ///
    /// Selection errors abort the cycle before anything is deleted. A failed victim
    /// does not stop the others; every failure is collected into
    /// [`CycleError::Terminations`].
    pub async fn kill_pods(&self) -> Result<CycleReport, CycleError> {
        let dry_run = self.executor.dry_run();

        let (candidates, victims) = match self.selection.select_victims().await? {
            Selection::NoCandidates => {
                debug!("pod not found");
                return Ok(CycleReport::no_candidates(dry_run));
            }
            Selection::Victims {
                candidates,
                victims,
            } => (candidates, victims),
        };

        let mut failures = TerminationFailures {
            attempted: victims.len(),
            failures: Vec::new(),
        };

        for victim in &victims {
            if let Err(e) = self.executor.terminate(victim).await {
                error!(
                    namespace = %victim.namespace,
                    name = %victim.name,
                    error = %e,
                    "Failed to delete pod"
                );
                failures.failures.push(e);
            }
        }

        info!(
            candidates,
            victims = victims.len(),
            failed = failures.len(),
            dry_run,
            "Cycle finished"
        );

        if !failures.is_empty() {
            return Err(CycleError::Terminations(failures));
        }

        Ok(CycleReport {
            candidates,
            victims: victims.iter().map(ToString::to_string).collect(),
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScopeError, TerminationError};
    use crate::executor::fakes::{FakeEvents, FakeStore};
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    fn engine(store: &Arc<FakeStore>, scope: &str, fraction: f64, dry_run: bool) -> ChaosEngine {
        let events = Arc::new(FakeEvents::default());
        let selection =
            SelectionEngine::new(store.clone(), ScopeSelector::parse(scope).unwrap(), fraction)
                .with_rng(StdRng::seed_from_u64(11));
        ChaosEngine::new(selection, TerminationExecutor::new(store.clone(), events, dry_run))
    }

    fn fleet() -> Vec<Instance> {
        vec![
            Instance::new("prod", "api-0"),
            Instance::new("prod", "api-1"),
            Instance::new("staging", "api-0"),
            Instance::new("prod", "worker-0").terminating_since(Utc::now()),
            Instance::new("prod", "worker-1"),
        ]
    }

    #[tokio::test]
    async fn test_candidates_are_scoped_and_live() {
        let store = Arc::new(FakeStore::with_pods(fleet()));
        let chaos = engine(&store, "prod", 1.0, true);

        let candidates = chaos.selection().select_candidates().await.unwrap();
        let names: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["prod/api-0", "prod/api-1", "prod/worker-1"]);
    }

    #[tokio::test]
    async fn test_select_victims_respects_fraction() {
        let pods: Vec<Instance> = (0..10).map(|i| Instance::new("prod", format!("p-{i}"))).collect();
        let store = Arc::new(FakeStore::with_pods(pods));
        let chaos = engine(&store, "", 0.5, true);

        match chaos.selection().select_victims().await.unwrap() {
            Selection::Victims {
                candidates,
                victims,
            } => {
                assert_eq!(candidates, 10);
                assert_eq!(victims.len(), 5);
            }
            Selection::NoCandidates => panic!("expected victims"),
        }
    }

    #[tokio::test]
    async fn test_no_candidates_is_not_an_error() {
        let store = Arc::new(FakeStore::with_pods(vec![Instance::new("staging", "a")]));
        let chaos = engine(&store, "prod", 1.0, false);

        assert_eq!(
            chaos.selection().select_victims().await.unwrap(),
            Selection::NoCandidates
        );

        let report = chaos.kill_pods().await.unwrap();
        assert_eq!(report.candidates, 0);
        assert!(report.victims.is_empty());
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_list_failure_aborts_cycle() {
        let store = Arc::new(FakeStore {
            fail_list: true,
            ..FakeStore::default()
        });
        let chaos = engine(&store, "", 1.0, false);

        let err = chaos.kill_pods().await.unwrap_err();
        assert!(matches!(err, CycleError::Select(SelectError::List(_))));
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_operator_kills_nothing() {
        let store = Arc::new(FakeStore::with_pods(fleet()));
        let chaos = engine(&store, "prod in (a,b)", 1.0, false);

        let err = chaos.kill_pods().await.unwrap_err();
        assert!(matches!(
            err,
            CycleError::Select(SelectError::Scope(ScopeError::UnsupportedOperator(_)))
        ));
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_going_and_aggregates() {
        let pods = vec![
            Instance::new("prod", "a"),
            Instance::new("prod", "b"),
            Instance::new("prod", "c"),
        ];
        let mut store = FakeStore::with_pods(pods);
        store.fail_delete_for.insert("prod/b".to_string());
        let store = Arc::new(store);
        let chaos = engine(&store, "", 1.0, false);

        let err = chaos.kill_pods().await.unwrap_err();
        let CycleError::Terminations(failures) = err else {
            panic!("expected termination failures, got {err:?}");
        };
        assert_eq!(failures.attempted, 3);
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures.failures[0],
            TerminationError::Delete { name, .. } if name == "b"
        ));

        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 3);
        let mut deleted = store.deleted();
        deleted.sort();
        assert_eq!(deleted, vec!["prod/a", "prod/c"]);
    }

    #[tokio::test]
    async fn test_dry_run_cycle_reports_victims_without_deleting() {
        let store = Arc::new(FakeStore::with_pods(fleet()));
        let chaos = engine(&store, "prod", 1.0, true);

        let report = chaos.kill_pods().await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.candidates, 3);
        assert_eq!(report.victims.len(), 3);
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["candidates"], 3);
    }
}
