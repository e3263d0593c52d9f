//! Summary statistics of per-generation quantities.

use serde::{Deserialize, Serialize};

/// Running mean, spread and extremes (Welford's algorithm).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;
        self.diff_2_sum += diff_a * (val - self.mean);
    }

    pub fn report(&self) -> AccumulatorReport {
        if self.n_vals == 0 {
            return AccumulatorReport {
                n_vals: 0,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        let std_dev = match self.n_vals {
            1 => f64::NAN,
            n => (self.diff_2_sum / (n - 1) as f64).sqrt(),
        };
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: self.mean,
            std_dev,
            min: self.min,
            max: self.max,
        }
    }
}

/// Value of one quantity at every generation of a run.
///
/// The report describes the plateau of the curve: the tail that remains once
/// the initial transient is discarded by the marginal standard error rule.
pub struct LearningCurve {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LearningCurveReport {
    pub n_vals: usize,
    /// Index of the first value of the plateau.
    pub plateau_start: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Standard error of the plateau mean.
    pub sem: f64,
    pub last: f64,
}

impl LearningCurve {
    pub fn new() -> Self {
        Self { vals: Vec::new() }
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> LearningCurveReport {
        let plateau_start = plateau_start(&self.vals);
        let plateau = &self.vals[plateau_start..];
        LearningCurveReport {
            n_vals: self.vals.len(),
            plateau_start,
            mean: mean(plateau),
            std_dev: sample_var(plateau).sqrt(),
            sem: blocking_sem(plateau),
            last: self.vals.last().copied().unwrap_or(f64::NAN),
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    match vals.len() {
        0 => f64::NAN,
        n => vals.iter().sum::<f64>() / n as f64,
    }
}

fn sample_var(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    let sq_sum: f64 = vals.iter().map(|val| (val - mean).powi(2)).sum();
    sq_sum / (vals.len() - 1) as f64
}

/// Standard error of the mean of correlated values (Flyvbjerg-Petersen blocking).
///
/// Pairs of neighbours are averaged until the estimate stops growing beyond
/// its own uncertainty.
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut blocks = vals.to_vec();
    let mut levels: Vec<(f64, f64)> = Vec::new();
    while blocks.len() >= 2 {
        let n = blocks.len() as f64;
        let sem_2 = sample_var(&blocks) / n;
        levels.push((sem_2, sem_2 * (2.0 / (n - 1.0)).sqrt()));
        blocks = blocks
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }

    let converged = (0..levels.len()).find(|&idx| {
        let floor = levels[idx..]
            .iter()
            .map(|(sem_2, err)| sem_2 - err)
            .fold(f64::NEG_INFINITY, f64::max);
        levels[idx].0 > floor
    });
    match converged.or(levels.len().checked_sub(1)) {
        Some(idx) => levels[idx].0.sqrt(),
        None => f64::NAN,
    }
}

/// Start of the plateau by the marginal standard error rule.
///
/// Candidate starts are `n / 2^k`; the one minimising the marginal
/// standard error of the remaining tail wins. Defaults to half the curve.
fn plateau_start(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    if n_vals == 0 {
        return 0;
    }

    let mut best = (f64::INFINITY, n_vals / 2);
    for shift in (1..=n_vals.ilog2() + 1).rev() {
        let start = n_vals >> shift;
        let tail = &vals[start..];
        let n_tail = tail.len() as f64;
        let mse = sample_var(tail) * (n_tail - 1.0) / (n_tail * n_tail);
        if mse < best.0 {
            best = (mse, start);
        }
    }
    best.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_matches_direct_formulas() {
        let mut acc = Accumulator::new();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert_eq!(report.n_vals, 8);
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!((report.min, report.max), (2.0, 9.0));
    }

    #[test]
    fn sparse_accumulators_report_nan() {
        assert!(Accumulator::new().report().mean.is_nan());

        let mut acc = Accumulator::new();
        acc.add(1.0);
        let report = acc.report();
        assert_eq!(report.mean, 1.0);
        assert!(report.std_dev.is_nan());
    }

    #[test]
    fn constant_curve_has_no_spread() {
        let mut curve = LearningCurve::new();
        for _ in 0..64 {
            curve.push(3.0);
        }
        let report = curve.report();
        assert_eq!(report.plateau_start, 0);
        assert_eq!(report.mean, 3.0);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.sem, 0.0);
        assert_eq!(report.last, 3.0);
    }

    #[test]
    fn transient_is_discarded() {
        // A fast rise followed by a noisy plateau around 10.
        let mut curve = LearningCurve::new();
        for idx in 0..256 {
            let val = if idx < 16 {
                idx as f64 * 0.5
            } else {
                10.0 + if idx % 2 == 0 { 0.1 } else { -0.1 }
            };
            curve.push(val);
        }
        let report = curve.report();
        assert!(report.plateau_start >= 16);
        assert!((report.mean - 10.0).abs() < 1e-9);
        assert!(report.sem < 0.1);
    }

    #[test]
    fn empty_curve_reports_nan() {
        let report = LearningCurve::new().report();
        assert_eq!(report.n_vals, 0);
        assert!(report.mean.is_nan());
        assert!(report.last.is_nan());
    }
}
