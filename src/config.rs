use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use. Every section is
/// optional and falls back to the classic game constants.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub agent: AgentConfig,
    pub obstacle: ObstacleConfig,
    pub world: WorldConfig,
    pub sprites: SpriteConfig,
    pub fitness: FitnessConfig,
    pub training: TrainingConfig,
}

/// Agent kinematics and decision parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Initial horizontal position (never changes).
    pub start_x: f64,
    /// Initial vertical position.
    pub start_y: f64,
    /// Downward acceleration per tick squared.
    pub gravity: f64,
    /// Velocity set by a jump (negative is upward).
    pub jump_velocity: f64,
    /// Maximum displacement magnitude per tick.
    pub terminal_displacement: f64,
    /// Extra upward displacement applied while rising.
    pub lift_bonus: f64,
    /// Distance below the jump height that still counts as rising.
    pub apex_buffer: f64,
    /// Tilt while rising (degrees).
    pub max_tilt: f64,
    /// Nose-dive cap (degrees).
    pub min_tilt: f64,
    /// Tilt decrease per tick while falling.
    pub tilt_rate: f64,
    /// Ticks each animation frame is held.
    pub animation_ticks: u32,
    /// Tilt at or below which the wings stop flapping.
    pub nose_dive_tilt: f64,
    /// Decision output above which the agent jumps.
    pub decision_threshold: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            start_x: 230.0,
            start_y: 350.0,
            gravity: 3.0,
            jump_velocity: -10.5,
            terminal_displacement: 16.0,
            lift_bonus: 2.0,
            apex_buffer: 50.0,
            max_tilt: 25.0,
            min_tilt: -90.0,
            tilt_rate: 20.0,
            animation_ticks: 5,
            nose_dive_tilt: -80.0,
            decision_threshold: 0.5,
        }
    }
}

/// Obstacle geometry and spawning parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObstacleConfig {
    /// Vertical size of the passable gap.
    pub gap: f64,
    /// Leftward scroll per tick.
    pub velocity: f64,
    /// Horizontal position of the first obstacle of a generation.
    pub first_spawn_x: f64,
    /// Horizontal position of every later obstacle.
    pub spawn_x: f64,
    /// Lower bound (inclusive) of the gap-centre height.
    pub gap_min: i32,
    /// Upper bound (exclusive) of the gap-centre height.
    pub gap_max: i32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            gap: 200.0,
            velocity: 5.0,
            first_spawn_x: 700.0,
            spawn_x: 600.0,
            gap_min: 50,
            gap_max: 450,
        }
    }
}

/// World bounds and timing.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Vertical position of the floor line.
    pub floor_y: f64,
    /// Part of the sprite allowed to sink below the floor line.
    pub floor_inset: f64,
    /// Vertical position above which agents are out of bounds.
    pub ceiling_y: f64,
    /// Width of one floor tile.
    pub floor_width: f64,
    /// Leftward floor scroll per tick.
    pub floor_velocity: f64,
    /// Ticks per simulated second.
    pub tick_rate: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            floor_y: 730.0,
            floor_inset: 10.0,
            ceiling_y: -50.0,
            floor_width: 672.0,
            floor_velocity: 5.0,
            tick_rate: 30,
        }
    }
}

/// Silhouette dimensions (pixels).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpriteConfig {
    pub bird_width: usize,
    pub bird_height: usize,
    pub pipe_width: usize,
    pub pipe_height: usize,
    /// Height of the wide lip at the open end of a pipe.
    pub pipe_lip_height: usize,
    /// How far the lip sticks out on each side of the pipe body.
    pub pipe_lip_overhang: usize,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            bird_width: 34,
            bird_height: 24,
            pipe_width: 104,
            pipe_height: 640,
            pipe_lip_height: 48,
            pipe_lip_overhang: 4,
        }
    }
}

/// Fitness deltas.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitnessConfig {
    /// Reward per tick survived.
    pub survival_reward: f64,
    /// Reward given to every survivor when an obstacle is passed.
    pub pass_bonus: f64,
    /// Penalty for hitting an obstacle.
    pub collision_penalty: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            survival_reward: 0.1,
            pass_bonus: 5.0,
            collision_penalty: 1.0,
        }
    }
}

/// Generation loop and breeding parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Number of agents per generation.
    pub n_agents: usize,
    /// Total number of generations of a run.
    pub max_generations: usize,
    /// Number of generations evaluated per invocation.
    pub generations_per_file: usize,
    /// Ticks after which a generation is stopped.
    pub max_ticks: usize,
    /// Score after which a generation is stopped (0 disables the limit).
    pub max_score: usize,
    /// Number of best networks copied unchanged to the next generation.
    pub n_elite: usize,
    /// Fraction of the ranked networks allowed to reproduce.
    pub survival_fraction: f64,
    /// Probability of mutating each weight of an offspring.
    pub prob_mut: f64,
    /// Standard deviation of mutation noise.
    pub std_dev_mut: f64,
    /// Standard deviation of initial weights.
    pub init_std_dev: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_agents: 50,
            max_generations: 50,
            generations_per_file: 10,
            max_ticks: 30_000,
            max_score: 0,
            n_elite: 2,
            survival_fraction: 0.2,
            prob_mut: 0.8,
            std_dev_mut: 0.5,
            init_std_dev: 1.0,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Missing sections and fields take
    /// their default values.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let agt = &self.agent;
        check_num(agt.gravity, 0.0..=100.0).context("invalid gravity")?;
        check_num(agt.jump_velocity, -100.0..=0.0).context("invalid jump velocity")?;
        check_num(agt.terminal_displacement, 0.0..=1000.0)
            .context("invalid terminal displacement")?;
        check_num(agt.lift_bonus, 0.0..=100.0).context("invalid lift bonus")?;
        check_num(agt.apex_buffer, 0.0..=1000.0).context("invalid apex buffer")?;
        check_num(agt.tilt_rate, 0.0..=360.0).context("invalid tilt rate")?;
        check_num(agt.min_tilt, -360.0..agt.max_tilt).context("invalid minimum tilt")?;
        check_num(agt.animation_ticks, 1..1000).context("invalid animation ticks")?;

        let obs = &self.obstacle;
        check_num(obs.gap, 0.0..=10_000.0).context("invalid obstacle gap")?;
        check_num(obs.velocity, 0.0..=1000.0).context("invalid obstacle velocity")?;
        check_num(obs.gap_min, i32::MIN..obs.gap_max).context("invalid gap height range")?;

        let wld = &self.world;
        check_num(wld.ceiling_y, f64::MIN..wld.floor_y).context("invalid ceiling")?;
        check_num(wld.floor_width, 1.0..=100_000.0).context("invalid floor width")?;
        check_num(wld.tick_rate, 1..1000).context("invalid tick rate")?;

        let spr = &self.sprites;
        check_num(spr.bird_width, 1..4096).context("invalid bird width")?;
        check_num(spr.bird_height, 1..4096).context("invalid bird height")?;
        check_num(spr.pipe_width, 1..4096).context("invalid pipe width")?;
        check_num(spr.pipe_height, 1..4096).context("invalid pipe height")?;
        check_num(spr.pipe_lip_height, 0..=spr.pipe_height).context("invalid pipe lip height")?;
        check_num(2 * spr.pipe_lip_overhang, 0..spr.pipe_width)
            .context("invalid pipe lip overhang")?;

        let fit = &self.fitness;
        check_num(fit.survival_reward, 0.0..=1000.0).context("invalid survival reward")?;
        check_num(fit.pass_bonus, 0.0..=1000.0).context("invalid pass bonus")?;
        check_num(fit.collision_penalty, 0.0..=1000.0).context("invalid collision penalty")?;

        let trn = &self.training;
        check_num(trn.n_agents, 1..100_000).context("invalid number of agents")?;
        check_num(trn.max_generations, 1..1_000_000).context("invalid maximum generations")?;
        check_num(trn.generations_per_file, 1..10_000)
            .context("invalid number of generations per file")?;
        check_num(trn.max_ticks, 1..100_000_000).context("invalid maximum ticks")?;
        check_num(trn.n_elite, 0..=trn.n_agents).context("invalid number of elites")?;
        check_num(trn.survival_fraction, 0.0..=1.0).context("invalid survival fraction")?;
        check_num(trn.prob_mut, 0.0..=1.0).context("invalid mutation probability")?;
        check_num(trn.std_dev_mut, 0.0..100.0).context("invalid mutation standard deviation")?;
        check_num(trn.init_std_dev, 0.0..100.0)
            .context("invalid initial weight standard deviation")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
