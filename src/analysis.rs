use crate::stats::{Accumulator, AccumulatorReport, LearningCurve, LearningCurveReport};
use crate::trainer::GenerationReport;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::Serialize;
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Observable computed over the generation reports of a run.
pub trait Obs {
    fn name(&self) -> &'static str;
    fn update(&mut self, report: &GenerationReport) -> Result<()>;
    fn report(&self) -> Result<Value>;
}

fn to_value<T: Serialize>(report: T) -> Result<Value> {
    serde_value::to_value(report).context("failed to convert report to value")
}

/// Score reached by each generation.
pub struct Score {
    curve: LearningCurve,
    max: usize,
}

impl Score {
    pub fn new() -> Self {
        Self {
            curve: LearningCurve::new(),
            max: 0,
        }
    }
}

#[derive(Serialize)]
struct ScoreReport {
    max: usize,
    series: LearningCurveReport,
}

impl Obs for Score {
    fn name(&self) -> &'static str {
        "score"
    }

    fn update(&mut self, report: &GenerationReport) -> Result<()> {
        self.curve.push(report.score as f64);
        self.max = self.max.max(report.score);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        to_value(ScoreReport {
            max: self.max,
            series: self.curve.report(),
        })
    }
}

/// Best fitness of each generation.
pub struct BestFitness {
    curve: LearningCurve,
}

impl BestFitness {
    pub fn new() -> Self {
        Self {
            curve: LearningCurve::new(),
        }
    }
}

impl Obs for BestFitness {
    fn name(&self) -> &'static str {
        "best_fitness"
    }

    fn update(&mut self, report: &GenerationReport) -> Result<()> {
        self.curve.push(report.best_fitness);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        to_value(self.curve.report())
    }
}

/// Mean fitness and survival time over all generations.
pub struct Survival {
    mean_fitness: Accumulator,
    seconds: Accumulator,
    n_stopped: usize,
}

impl Survival {
    pub fn new() -> Self {
        Self {
            mean_fitness: Accumulator::new(),
            seconds: Accumulator::new(),
            n_stopped: 0,
        }
    }
}

#[derive(Serialize)]
struct SurvivalReport {
    mean_fitness: AccumulatorReport,
    seconds: AccumulatorReport,
    n_stopped: usize,
}

impl Obs for Survival {
    fn name(&self) -> &'static str {
        "survival"
    }

    fn update(&mut self, report: &GenerationReport) -> Result<()> {
        self.mean_fitness.add(report.mean_fitness);
        self.seconds.add(report.seconds);
        if report.stopped {
            self.n_stopped += 1;
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        to_value(SurvivalReport {
            mean_fitness: self.mean_fitness.report(),
            seconds: self.seconds.report(),
            n_stopped: self.n_stopped,
        })
    }
}

/// Runs every observable over the report files of a run.
pub struct Analyzer {
    n_generations: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Score::new()),
            Box::new(BestFitness::new()),
            Box::new(Survival::new()),
        ];
        Self {
            n_generations: 0,
            obs_ptr_vec,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let reports: Vec<GenerationReport> =
            decode::from_read(&mut reader).context("failed to read reports")?;
        for report in &reports {
            for obs in &mut self.obs_ptr_vec {
                obs.update(report).context("failed to update observable")?;
            }
        }
        self.n_generations += reports.len();
        Ok(())
    }

    /// Collect every observable's report, keyed by name.
    pub fn results(&self) -> Result<BTreeMap<String, Value>> {
        let mut results = BTreeMap::new();
        results.insert(
            "n_generations".to_string(),
            Value::U64(self.n_generations as u64),
        );
        for obs in &self.obs_ptr_vec {
            let report = obs
                .report()
                .with_context(|| format!("failed to report {}", obs.name()))?;
            results.insert(obs.name().to_string(), report);
        }
        Ok(results)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let results = self.results()?;
        log::info!("{results:#?}");
        encode::write_named(&mut writer, &results).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(generation: usize, score: usize, best_fitness: f64) -> GenerationReport {
        GenerationReport {
            generation,
            n_agents: 10,
            score,
            ticks: 30 * (generation + 1),
            seconds: (generation + 1) as f64,
            stopped: generation == 3,
            best_fitness,
            mean_fitness: best_fitness / 2.0,
        }
    }

    #[test]
    fn results_cover_all_generations() {
        let dir = std::env::temp_dir().join(format!("flapsim-analysis-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("failed to create test directory");

        let reports = vec![report(1, 0, 2.0), report(2, 3, 20.0)];
        let file = dir.join("generations-0000.msgpack");
        let mut writer = File::create(&file).expect("failed to create file");
        encode::write(&mut writer, &reports).expect("failed to write reports");
        let file_b = dir.join("generations-0001.msgpack");
        let mut writer = File::create(&file_b).expect("failed to create file");
        encode::write(&mut writer, &vec![report(3, 1, 8.0)]).expect("failed to write reports");

        let mut analyzer = Analyzer::new();
        analyzer.add_file(&file).expect("failed to add file");
        analyzer.add_file(&file_b).expect("failed to add file");
        let results = analyzer.results().expect("failed to compute results");

        assert_eq!(results["n_generations"], Value::U64(3));
        let Value::Map(score) = &results["score"] else {
            panic!("score report is not a map");
        };
        assert_eq!(
            score.get(&Value::String("max".to_string())),
            Some(&Value::U64(3))
        );
        let Value::Map(survival) = &results["survival"] else {
            panic!("survival report is not a map");
        };
        assert_eq!(
            survival.get(&Value::String("n_stopped".to_string())),
            Some(&Value::U64(1))
        );

        analyzer
            .save_results(dir.join("results.msgpack"))
            .expect("failed to save results");
        std::fs::remove_dir_all(&dir).ok();
    }
}
