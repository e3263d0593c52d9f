use crate::analysis::Analyzer;
use crate::config::Config;
use crate::trainer::Trainer;
use anyhow::{Context, Result, bail};
use glob::glob;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Start a new run, or continue run `run_idx` from its checkpoint.
    pub fn run_training(&self, run_idx: Option<usize>) -> Result<()> {
        let (run_idx, file_idx, mut trainer) = match run_idx {
            None => {
                let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

                let run_dir = self.run_dir(run_idx);
                fs::create_dir_all(&run_dir)
                    .with_context(|| format!("failed to create {run_dir:?}"))?;
                log::info!("created {run_dir:?}");

                let trainer = Trainer::generate_initial_condition(self.cfg.clone())
                    .context("failed to generate initial condition")?;

                (run_idx, 0, trainer)
            }
            Some(run_idx) => {
                let trainer = self.load_trainer(run_idx)?;

                let file_idx = self
                    .count_generation_files(run_idx)
                    .context("failed to count generation files")?;

                (run_idx, file_idx, trainer)
            }
        };

        trainer
            .perform_training(self.generations_file(run_idx, file_idx))
            .context("failed to perform training")?;

        if let Some(champion) = trainer.champion() {
            log::info!(
                "champion of generation {} with fitness {:.2}: weights {:?}, bias {:.4}",
                champion.generation,
                champion.fitness,
                champion.network.weights(),
                champion.network.bias()
            );
        }

        trainer
            .save_checkpoint(self.checkpoint_file(run_idx))
            .context("failed to save checkpoint")?;

        Ok(())
    }

    pub fn run_analysis(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();

            let n_files = self
                .count_generation_files(run_idx)
                .context("failed to count generation files")?;
            for file_idx in 0..n_files {
                analyzer
                    .add_file(self.generations_file(run_idx, file_idx))
                    .context("failed to add file")?;
            }

            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;
        }

        Ok(())
    }

    /// Record the champion of run `run_idx` playing alone.
    pub fn run_replay(&self, run_idx: usize, seed: u64) -> Result<()> {
        let trainer = self.load_trainer(run_idx)?;
        let snapshots = trainer
            .replay_champion(seed)
            .context("failed to replay champion")?;

        let file = self.replay_file(run_idx);
        let writer = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(writer);
        encode::write(&mut writer, &snapshots).context("failed to serialize snapshots")?;
        writer.flush().context("failed to flush writer stream")?;
        log::info!("saved {} frames to {file:?}", snapshots.len());

        Ok(())
    }

    /// Remove analysis results and replays of every run.
    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            for file in [self.results_file(run_idx), self.replay_file(run_idx)] {
                if file.exists() {
                    fs::remove_file(&file)
                        .with_context(|| format!("failed to remove {file:?}"))?;
                    log::info!("removed {file:?}");
                }
            }
        }
        Ok(())
    }

    fn load_trainer(&self, run_idx: usize) -> Result<Trainer> {
        let checkpoint_file = self.checkpoint_file(run_idx);
        let trainer = Trainer::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if trainer.cfg() != &self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        log::info!(
            "loaded {checkpoint_file:?} at generation {}",
            trainer.generation()
        );
        Ok(trainer)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn count_generation_files(&self, run_idx: usize) -> Result<usize> {
        let pattern = self.run_dir(run_idx).join("generations-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob generation files")?
            .filter_map(Result::ok)
            .count();
        Ok(count)
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }

    fn generations_file(&self, run_idx: usize, file_idx: usize) -> PathBuf {
        self.run_dir(run_idx)
            .join(format!("generations-{file_idx:04}.msgpack"))
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }

    fn replay_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("replay.msgpack")
    }
}
