use super::{
    restore_feasibility, sweep_boundary, OptimizationConfig, Restoration, SecurityError,
    SecurityModel, SessionResult,
};
use crate::lp::{GoodLpBackend, LpBackend};
use crate::sensitivity::{LimitSelection, SensitivityIndex};
use sco_core::NetworkModel;
use std::time::Instant;
use tracing::info;

/// One optimization session over a network: index, build, restore, sweep.
///
/// # Example
///
/// ```no_run
/// use sco_algo::security::{OptimizationConfig, SetpointOptimizer};
/// use sco_core::NetworkModel;
///
/// let network = NetworkModel::new(); // Load your network
/// let result = SetpointOptimizer::new(&network, OptimizationConfig::default()).run()?;
/// println!("{}", result.summary());
/// # Ok::<(), sco_algo::security::SecurityError>(())
/// ```
pub struct SetpointOptimizer<'a> {
    network: &'a NetworkModel,
    config: OptimizationConfig,
    backend: Box<dyn LpBackend>,
}

impl<'a> SetpointOptimizer<'a> {
    pub fn new(network: &'a NetworkModel, config: OptimizationConfig) -> Self {
        let backend = Box::new(GoodLpBackend::new(config.solver));
        Self {
            network,
            config,
            backend,
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn LpBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn index(&self) -> Result<SensitivityIndex, SecurityError> {
        SensitivityIndex::build(
            self.network,
            &LimitSelection {
                limit_name: self.config.limit_name.clone(),
                contingency_limit_name: self.config.contingency_limit_name.clone(),
            },
        )
    }

    pub fn build(&self, index: &SensitivityIndex) -> Result<SecurityModel, SecurityError> {
        SecurityModel::build(self.network, index, &self.config)
    }

    /// Probe and restore only.
    pub fn restore(&self) -> Result<Restoration, SecurityError> {
        let index = self.index()?;
        let model = self.build(&index)?;
        restore_feasibility(&model, self.backend.as_ref(), self.config.feasibility_tolerance)
    }

    pub fn run(&self) -> Result<SessionResult, SecurityError> {
        let start = Instant::now();
        let index = self.index()?;
        let model = self.build(&index)?;
        info!(
            pairs = index.pair_count(),
            solver = self.backend.id(),
            "optimization session started"
        );

        let restoration =
            restore_feasibility(&model, self.backend.as_ref(), self.config.feasibility_tolerance)?;
        let sweep = sweep_boundary(
            &restoration.model,
            self.backend.as_ref(),
            self.config.tie_break_weight,
        )?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            scenarios = sweep.scenarios.len(),
            "optimization session finished"
        );
        Ok(SessionResult {
            solver: self.backend.id().to_string(),
            restoration: restoration.report,
            scenarios: sweep.scenarios,
            flows: sweep.flows,
            diagnostics: index.diagnostics().clone(),
        })
    }
}
