use std::sync::Arc;

use anyhow::Result;

use super::strategy::{
    Collaborators, SetupToolsStrategy, SourceLayoutStrategy, Strategy, StrategyKind, WheelStrategy,
};
use crate::tooling::report::Reporter;

/// Drives the strategy chain for one app folder.
///
/// Strategies run in a fixed order (source layout, setuptools, wheel). The
/// order only matters when a folder would be claimed by more than one.
pub struct InstallationOrchestrator {
    strategies: Vec<Box<dyn Strategy>>,
    reporter: Arc<dyn Reporter>,
}

impl InstallationOrchestrator {
    pub fn new(collaborators: &Collaborators) -> Self {
        let reporter = Arc::clone(&collaborators.reporter);
        Self::with_strategies(
            vec![
                Box::new(SourceLayoutStrategy::new(collaborators.clone())),
                Box::new(SetupToolsStrategy::new(collaborators.clone())),
                Box::new(WheelStrategy::new(collaborators.clone())),
            ],
            reporter,
        )
    }

    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            strategies,
            reporter,
        }
    }

    pub fn order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|strategy| strategy.kind()).collect()
    }

    /// First strategy in chain order that owns the folder.
    pub fn claimant(&self) -> Option<&dyn Strategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.it_is_me())
            .map(|strategy| &**strategy)
    }

    /// Drift as seen by the owning strategy only. An unclaimed folder never
    /// drifts.
    ///
    /// # Errors
    /// Propagates the owning strategy's scan failure.
    pub fn detect_drift(&self) -> Result<bool> {
        match self.claimant() {
            Some(strategy) => {
                let changed = strategy.files_changed()?;
                self.reporter.debug(&format!(
                    "{} drift check: {}",
                    strategy.kind(),
                    if changed { "changed" } else { "unchanged" }
                ));
                Ok(changed)
            }
            None => Ok(false),
        }
    }

    /// Thread the continuation flag through every strategy. Returns the
    /// strategy that handled the folder, if any.
    ///
    /// # Errors
    /// The first strategy error aborts the chain and is returned as is.
    pub fn run(&self, start_fresh: bool) -> Result<Option<StrategyKind>> {
        let mut continue_processing = true;
        let mut handled = None;
        for strategy in &self.strategies {
            let next = strategy.install_and_start(start_fresh, continue_processing)?;
            if continue_processing && !next {
                handled = Some(strategy.kind());
            }
            continue_processing = next;
            if !continue_processing {
                break;
            }
        }
        if handled.is_none() {
            self.reporter
                .warn("no strategy could install or start the app folder");
        }
        Ok(handled)
    }
}
