use crate::config::Config;
use crate::network::Network;
use crate::population::Decide;
use crate::simulation::{Simulation, Snapshot, Status};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Summary of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Generation number (starting at 1).
    pub generation: usize,
    /// Agents born in the generation.
    pub n_agents: usize,
    /// Obstacles passed before the generation ended.
    pub score: usize,
    /// Ticks simulated.
    pub ticks: usize,
    /// Simulated time in seconds.
    pub seconds: f64,
    /// Whether the generation was stopped with agents still alive.
    pub stopped: bool,
    pub best_fitness: f64,
    pub mean_fitness: f64,
}

/// Best network found so far together with its fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Champion {
    pub generation: usize,
    pub fitness: f64,
    pub network: Network,
}

/// Generation loop driving the simulation with evolving networks.
///
/// Holds the configuration, current networks, best network and random number
/// generator, and provides methods to initialize, train, save and load runs.
#[derive(Serialize, Deserialize)]
pub struct Trainer {
    cfg: Config,
    networks: Vec<Network>,
    champion: Option<Champion>,
    generation: usize,
    rng: ChaCha12Rng,
}

impl Trainer {
    /// Create a new `Trainer` with the given configuration and random networks.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng()?;
        Self::with_rng(cfg, rng)
    }

    fn with_rng(cfg: Config, mut rng: ChaCha12Rng) -> Result<Self> {
        let networks: Vec<Network> = (0..cfg.training.n_agents)
            .map(|_| Network::random(&mut rng, cfg.training.init_std_dev))
            .collect::<Result<_>>()
            .context("failed to create initial networks")?;

        Ok(Self {
            cfg,
            networks,
            champion: None,
            generation: 0,
            rng,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Number of generations evaluated so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn champion(&self) -> Option<&Champion> {
        self.champion.as_ref()
    }

    /// Whether the run has evaluated all its generations.
    pub fn is_finished(&self) -> bool {
        self.generation >= self.cfg.training.max_generations
    }

    /// Train up to `generations_per_file` generations and save their reports to a binary file.
    ///
    /// The file is only created once every generation has been evaluated.
    pub fn perform_training<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        if self.is_finished() {
            bail!(
                "run already reached {} generations",
                self.cfg.training.max_generations
            );
        }

        let n_gens = self
            .cfg
            .training
            .generations_per_file
            .min(self.cfg.training.max_generations - self.generation);
        let mut reports = Vec::with_capacity(n_gens);
        for i_gen in 0..n_gens {
            let report = self
                .perform_generation()
                .context("failed to perform generation")?;
            log::info!(
                "generation {:4}: score {:4}, ticks {:6}, best fitness {:9.2}, mean fitness {:9.2}",
                report.generation,
                report.score,
                report.ticks,
                report.best_fitness,
                report.mean_fitness
            );
            reports.push(report);

            let progress = 100.0 * (i_gen + 1) as f64 / n_gens as f64;
            log::info!("completed {progress:06.2}%");
        }

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &reports).context("failed to serialize reports")?;
        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire trainer state.
    ///
    /// Can be used to resume the training later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize trainer")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved trainer checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let trainer = decode::from_read(&mut reader).context("failed to deserialize trainer")?;
        Ok(trainer)
    }

    /// Play the champion alone and record every frame.
    pub fn replay_champion(&self, seed: u64) -> Result<Vec<Snapshot>> {
        let champion = self
            .champion
            .as_ref()
            .context("no generation has been evaluated yet")?;
        log::info!(
            "replaying champion of generation {} (fitness {:.2})",
            champion.generation,
            champion.fitness
        );

        let deciders: Vec<Box<dyn Decide>> = vec![Box::new(champion.network.clone())];
        let rng = ChaCha12Rng::seed_from_u64(seed);
        let mut sim = Simulation::new(&self.cfg, champion.generation, deciders, rng);

        let mut snapshots = vec![sim.snapshot()];
        while sim.status() == Status::Running {
            sim.step();
            self.check_limits(&mut sim);
            let snapshot = sim.snapshot();
            log::trace!("{snapshot:?}");
            snapshots.push(snapshot);
        }
        log::info!("replay ended at frame {} with score {}", sim.frame(), sim.score());

        Ok(snapshots)
    }

    fn perform_generation(&mut self) -> Result<GenerationReport> {
        self.generation += 1;

        // Evaluate the current networks in a fresh simulation context.
        let deciders = self
            .networks
            .iter()
            .map(|net| Box::new(net.clone()) as Box<dyn Decide>)
            .collect();
        let rng = ChaCha12Rng::from_rng(&mut self.rng);
        let mut sim = Simulation::new(&self.cfg, self.generation, deciders, rng);

        let mut stopped = false;
        while sim.status() == Status::Running {
            sim.step();
            stopped = self.check_limits(&mut sim);
        }
        let fitness = sim.fitness();

        let ranking = rank(&fitness);
        let best = ranking.first().context("population is empty")?;
        let best_fitness = fitness[*best];
        let mean_fitness = fitness.iter().sum::<f64>() / fitness.len() as f64;

        if self
            .champion
            .as_ref()
            .is_none_or(|champ| best_fitness > champ.fitness)
        {
            self.champion = Some(Champion {
                generation: self.generation,
                fitness: best_fitness,
                network: self.networks[*best].clone(),
            });
        }

        // Breed the networks of the next generation.
        self.networks = self
            .breed(&ranking)
            .context("failed to breed next generation")?;

        Ok(GenerationReport {
            generation: self.generation,
            n_agents: sim.population().n_born(),
            score: sim.score(),
            ticks: sim.frame(),
            seconds: sim.frame() as f64 / self.cfg.world.tick_rate as f64,
            stopped,
            best_fitness,
            mean_fitness,
        })
    }

    // Stop a generation that hit the tick or score limit; returns true if stopped.
    fn check_limits(&self, sim: &mut Simulation) -> bool {
        let trn = &self.cfg.training;
        let max_score_reached = trn.max_score > 0 && sim.score() >= trn.max_score;
        if sim.status() == Status::Running && (sim.frame() >= trn.max_ticks || max_score_reached)
        {
            sim.stop();
            return true;
        }
        false
    }

    fn breed(&mut self, ranking: &[usize]) -> Result<Vec<Network>> {
        let trn = &self.cfg.training;
        let n_agents = trn.n_agents;

        let n_parents = ((trn.survival_fraction * ranking.len() as f64).ceil() as usize)
            .clamp(1, ranking.len());
        let parents = &ranking[..n_parents];

        let mut next = Vec::with_capacity(n_agents);

        // Elites are copied unchanged.
        for &idx in ranking.iter().take(trn.n_elite) {
            next.push(self.networks[idx].clone());
        }

        // Offspring are mutated copies of randomly chosen parents.
        while next.len() < n_agents {
            let &idx = parents
                .choose(&mut self.rng)
                .context("failed to choose a parent")?;
            let mut child = self.networks[idx].clone();
            child.mutate(&mut self.rng, trn.prob_mut, trn.std_dev_mut)?;
            next.push(child);
        }

        Ok(next)
    }
}

/// Agent indices sorted by decreasing fitness; ties keep index order.
fn rank(fitness: &[f64]) -> Vec<usize> {
    let mut ranking: Vec<usize> = (0..fitness.len()).collect();
    ranking.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));
    ranking
}
