// src/status/mod.rs

//! Weighted progress model
//!
//! Every command registers one or more [`OperationStatus`] entries with a
//! shared [`UpdaterStatus`] during its prepare phase. While executing, the
//! owning command is the sole writer of its operations; any other thread may
//! read them at any time. Values live in atomics so readers never block the
//! worker, and a reader sees an eventually-consistent snapshot.
//!
//! Overall progress is `Σ(weight_i · progress_i) / Σ(weight_i)`. Weights are
//! fixed at registration and each operation's progress never regresses, so the
//! aggregate is monotonically non-decreasing over one pipeline run.

pub mod weight;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

fn load_f64(value: &AtomicU64) -> f64 {
    f64::from_bits(value.load(Ordering::Acquire))
}

/// One weighted, observable unit of work
#[derive(Debug)]
pub struct OperationStatus {
    weight: f64,
    active: AtomicBool,
    progress: AtomicU64,
    description: RwLock<String>,
}

impl OperationStatus {
    /// Create an inactive operation with zero progress
    ///
    /// Negative or non-finite weights are treated as zero.
    pub fn new(weight: f64) -> Self {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        Self {
            weight,
            active: AtomicBool::new(false),
            progress: AtomicU64::new(0f64.to_bits()),
            description: RwLock::new(String::new()),
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn progress(&self) -> f64 {
        load_f64(&self.progress)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn description(&self) -> String {
        self.description
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn set_description(&self, description: impl Into<String>) {
        *self
            .description
            .write()
            .unwrap_or_else(PoisonError::into_inner) = description.into();
    }

    /// Mark the operation active with the given description
    pub fn begin(&self, description: impl Into<String>) {
        self.set_description(description);
        self.set_active(true);
    }

    /// Advance progress, clamped to `[0, 1]`
    ///
    /// Values lower than the current progress are ignored and NaN is dropped,
    /// so progress can only move forward.
    pub fn set_progress(&self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        let progress = progress.clamp(0.0, 1.0);
        let _ = self
            .progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (progress > f64::from_bits(current)).then(|| progress.to_bits())
            });
    }

    /// Set progress to 1.0 and deactivate
    pub fn complete(&self) {
        self.set_progress(1.0);
        self.set_active(false);
    }
}

/// Point-in-time view of the aggregate for presentation layers
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Overall normalized progress in `[0, 1]`
    pub progress: f64,
    /// Description of the most recently registered active operation
    pub description: Option<String>,
    /// Progress of that active operation
    pub operation_progress: Option<f64>,
}

/// Aggregates registered operations into one normalized percentage
///
/// Cloning shares the same set of operations.
#[derive(Debug, Clone, Default)]
pub struct UpdaterStatus {
    operations: Arc<RwLock<Vec<Arc<OperationStatus>>>>,
}

impl UpdaterStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation to the aggregate; registration order is irrelevant
    pub fn register_operation(&self, operation: Arc<OperationStatus>) {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }

    /// Create and register an operation with the given weight
    pub fn register(&self, weight: f64) -> Arc<OperationStatus> {
        let operation = Arc::new(OperationStatus::new(weight));
        self.register_operation(Arc::clone(&operation));
        operation
    }

    /// Drop every registered operation so a new run starts from zero
    ///
    /// Clones keep observing the same aggregate.
    pub fn clear(&self) {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn operations(&self) -> Vec<Arc<OperationStatus>> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Weighted average progress of every registered operation
    ///
    /// Returns 0.0 with no operations. If every weight is zero the plain mean
    /// is used instead.
    pub fn progress(&self) -> f64 {
        let operations = self.operations.read().unwrap_or_else(PoisonError::into_inner);
        if operations.is_empty() {
            return 0.0;
        }

        let total_weight: f64 = operations.iter().map(|op| op.weight()).sum();
        let progress = if total_weight > 0.0 {
            operations
                .iter()
                .map(|op| op.weight() * op.progress())
                .sum::<f64>()
                / total_weight
        } else {
            operations.iter().map(|op| op.progress()).sum::<f64>() / operations.len() as f64
        };

        progress.clamp(0.0, 1.0)
    }

    /// The most recently registered operation that is currently active
    pub fn active_operation(&self) -> Option<Arc<OperationStatus>> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|op| op.is_active())
            .cloned()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let active = self.active_operation();
        StatusSnapshot {
            progress: self.progress(),
            description: active.as_ref().map(|op| op.description()),
            operation_progress: active.as_ref().map(|op| op.progress()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_status_reports_zero() {
        let status = UpdaterStatus::new();
        assert_eq!(status.progress(), 0.0);
        assert_eq!(status.snapshot().description, None);
    }

    #[test]
    fn test_clear_starts_a_new_run() {
        let status = UpdaterStatus::new();
        let observer = status.clone();

        let stale = status.register(2.0);
        stale.set_progress(0.4);
        status.register(1.0);
        assert!(observer.progress() > 0.0);

        status.clear();
        assert!(observer.operations().is_empty());
        assert_eq!(observer.progress(), 0.0);

        let fresh = status.register(1.0);
        fresh.complete();
        assert_eq!(observer.progress(), 1.0);
    }

    #[test]
    fn test_weighted_average() {
        let status = UpdaterStatus::new();
        let heavy = status.register(3.0);
        let light = status.register(1.0);

        heavy.set_progress(0.5);
        assert!((status.progress() - 0.375).abs() < 1e-9);

        light.complete();
        assert!((status.progress() - 0.625).abs() < 1e-9);

        heavy.complete();
        assert!((status.progress() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_fall_back_to_mean() {
        let status = UpdaterStatus::new();
        let a = status.register(0.0);
        let _b = status.register(0.0);
        a.complete();
        assert!((status.progress() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_progress_is_clamped_and_never_regresses() {
        let op = OperationStatus::new(1.0);
        op.set_progress(0.4);
        op.set_progress(0.2);
        assert!((op.progress() - 0.4).abs() < 1e-9);

        op.set_progress(f64::NAN);
        assert!((op.progress() - 0.4).abs() < 1e-9);

        op.set_progress(7.0);
        assert_eq!(op.progress(), 1.0);
    }

    #[test]
    fn test_invalid_weight_is_zero() {
        assert_eq!(OperationStatus::new(-3.0).weight(), 0.0);
        assert_eq!(OperationStatus::new(f64::INFINITY).weight(), 0.0);
    }

    #[test]
    fn test_aggregate_is_monotonic() {
        let status = UpdaterStatus::new();
        let ops: Vec<_> = [0.1, 5.0, 2.5, 0.0001]
            .iter()
            .map(|w| status.register(*w))
            .collect();

        let mut last = status.progress();
        for op in &ops {
            for step in 0..=10 {
                op.set_progress(step as f64 / 10.0);
                let current = status.progress();
                assert!(current >= last);
                assert!((0.0..=1.0).contains(&current));
                last = current;
            }
        }
        assert!((last - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_reports_active_operation() {
        let status = UpdaterStatus::new();
        let download = status.register(1.0);
        let install = status.register(1.0);

        download.begin("Downloading package...");
        download.set_progress(0.5);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.description.as_deref(), Some("Downloading package..."));
        assert_eq!(snapshot.operation_progress, Some(0.5));

        download.complete();
        install.begin("Installing package...");
        assert_eq!(
            status.snapshot().description.as_deref(),
            Some("Installing package...")
        );
    }

    #[test]
    fn test_reads_from_other_thread() {
        let status = UpdaterStatus::new();
        let op = status.register(1.0);
        let observer = status.clone();

        let handle = std::thread::spawn(move || {
            let mut last = 0.0;
            for _ in 0..100 {
                let current = observer.progress();
                assert!(current >= last);
                last = current;
            }
        });

        for step in 0..=100 {
            op.set_progress(step as f64 / 100.0);
        }
        handle.join().unwrap();
    }
}
