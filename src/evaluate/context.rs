//! Explicit evaluation context holding one plan per device

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{get_config, EvalConfig};
use crate::error::KilnResult;
use crate::ops::Expr;
use crate::tensor::{Device, Tensor};
use super::buffer::ConstHandle;
use super::plan::{EvalPlan, FlushReport};

/// Owns the evaluation plans for one evaluation session.
///
/// Each context has its own pending work, so separate threads can each drive
/// their own. A node pending in several contexts is computed by whichever
/// flushes first; the other flushes skip it and leave it out of their
/// reports.
pub struct EvalContext {
    config: EvalConfig,
    plans: HashMap<Device, EvalPlan>,
}

impl EvalContext {
    /// A context using the global evaluation settings.
    pub fn new() -> Self {
        Self::with_config(get_config().evaluation)
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Self {
            config,
            plans: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn plan(&self, device: Device) -> Option<&EvalPlan> {
        self.plans.get(&device)
    }

    pub fn plan_mut(&mut self, device: Device) -> &mut EvalPlan {
        let config = self.config;
        self.plans
            .entry(device)
            .or_insert_with(|| EvalPlan::new(device, config))
    }

    /// Items waiting for the next flush, across devices.
    pub fn pending(&self) -> usize {
        self.plans.values().map(EvalPlan::len).sum()
    }

    /// Enqueue `expr` (and whatever it depends on) without running anything.
    pub fn register(&mut self, expr: &Expr) -> KilnResult<ConstHandle> {
        expr.eval_register(self.plan_mut(expr.device()))
    }

    /// Run all pending work on every device.
    pub fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        for plan in self.plans.values_mut() {
            report.merge(plan.flush());
        }
        report
    }

    pub fn evaluate(&mut self, expr: &Expr) -> KilnResult<Arc<Tensor>> {
        let handle = self.register(expr)?;
        self.flush();
        Ok(handle.data())
    }

    /// Evaluate several expressions in one flush, so work they share runs once.
    pub fn evaluate_all(&mut self, exprs: &[&Expr]) -> KilnResult<Vec<Arc<Tensor>>> {
        let handles = exprs
            .iter()
            .map(|expr| self.register(expr))
            .collect::<KilnResult<Vec<_>>>()?;
        let report = self.flush();
        debug!(requested = exprs.len(), executed = report.len(), "evaluated batch");
        Ok(handles.iter().map(ConstHandle::data).collect())
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}
