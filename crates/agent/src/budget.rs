//! Per-loop iteration and wall-clock budgets.

use std::time::Duration;

use alin_config::AgentConfig;
use alin_core::{BudgetKind, LoopError};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBudget {
    /// Model rounds that may request tools.
    pub max_iterations: u32,
    /// `None` disables the time budget.
    pub max_wall_clock: Option<Duration>,
}

impl LoopBudget {
    pub fn new(max_iterations: u32, max_wall_clock: Option<Duration>) -> Self {
        Self {
            max_iterations,
            max_wall_clock,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.max_iterations, config.max_wall_clock_secs.map(Duration::from_secs))
    }

    /// Start the clock.
    pub fn start(self) -> BudgetClock {
        BudgetClock {
            budget: self,
            deadline: self.max_wall_clock.map(|d| Instant::now() + d),
            iterations_used: 0,
        }
    }
}

impl Default for LoopBudget {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// A running budget.
#[derive(Debug, Clone)]
pub struct BudgetClock {
    budget: LoopBudget,
    deadline: Option<Instant>,
    iterations_used: u32,
}

impl BudgetClock {
    pub fn iterations_used(&self) -> u32 {
        self.iterations_used
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn record_iteration(&mut self) {
        self.iterations_used += 1;
    }

    /// Checked before every model call.
    pub fn check(&self) -> Result<(), LoopError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LoopError::BudgetExceeded { kind: BudgetKind::Time });
        }
        if self.iterations_used >= self.budget.max_iterations {
            return Err(LoopError::BudgetExceeded {
                kind: BudgetKind::Iterations,
            });
        }
        Ok(())
    }
}
