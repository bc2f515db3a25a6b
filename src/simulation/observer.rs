//! Round and attack observers, plus the external stop signal

use crate::bots::extractor::AttackOutcome;
use crate::simulation::orchestrator::RoundSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// Callbacks invoked synchronously by the round loop. Errors are logged and
/// never abort the run.
pub trait SimulationObserver: Send {
    fn name(&self) -> &str {
        "observer"
    }

    fn on_round(&mut self, _snapshot: &RoundSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_attack(&mut self, _outcome: &AttackOutcome) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Registered observers, notified in registration order
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn SimulationObserver>>,
}

impl ObserverSet {
    pub fn push(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    pub fn notify_round(&mut self, snapshot: &RoundSnapshot) {
        for observer in &mut self.observers {
            if let Err(e) = observer.on_round(snapshot) {
                error!("Observer {} failed on round {}: {:#}", observer.name(), snapshot.round, e);
            }
        }
    }

    pub fn notify_attack(&mut self, outcome: &AttackOutcome) {
        for observer in &mut self.observers {
            if let Err(e) = observer.on_attack(outcome) {
                error!(
                    "Observer {} failed on attack {}: {:#}",
                    observer.name(),
                    outcome.opportunity_id,
                    e
                );
            }
        }
    }
}

/// Cloneable flag that ends the round loop after the current round
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
