//! Per-tick orchestration of one generation.

use crate::collision::{collides, out_of_bounds};
use crate::config::Config;
use crate::mask::SpriteMasks;
use crate::obstacle::{Floor, ObstacleField};
use crate::population::{AgentId, Decide, Population};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

/// Lifecycle of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Running,
    Ended,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub status: Status,
    /// Agents eliminated this tick, in elimination order.
    pub eliminated: Vec<AgentId>,
    /// Whether the lead agent passed an obstacle this tick.
    pub passed: bool,
}

/// Read-only view of an agent for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: AgentId,
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
    pub tilt: f64,
    pub frame: usize,
}

/// Read-only view of an obstacle for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleView {
    pub x: f64,
    pub height: f64,
    pub top: f64,
    pub bottom: f64,
    pub passed: bool,
}

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generation: usize,
    pub frame: usize,
    pub score: usize,
    pub alive: usize,
    pub floor_x: (f64, f64),
    pub agents: Vec<AgentView>,
    pub obstacles: Vec<ObstacleView>,
}

/// Simulation context of a single generation.
///
/// Owns the population, the obstacle course and the counters. A new
/// generation gets a new context.
pub struct Simulation {
    cfg: Config,
    masks: SpriteMasks,
    population: Population,
    field: ObstacleField,
    floor: Floor,
    rng: ChaCha12Rng,
    generation: usize,
    score: usize,
    frame: usize,
    status: Status,
}

impl Simulation {
    /// Create a generation with one agent per decision function.
    pub fn new(
        cfg: &Config,
        generation: usize,
        deciders: Vec<Box<dyn Decide>>,
        mut rng: ChaCha12Rng,
    ) -> Self {
        let masks = SpriteMasks::new(&cfg.sprites);
        let population = Population::new(deciders, &cfg.agent);
        let field = ObstacleField::new(cfg, &mut rng);
        let floor = Floor::new(&cfg.world);
        let status = if population.is_empty() {
            Status::Ended
        } else {
            Status::Running
        };
        Self {
            cfg: cfg.clone(),
            masks,
            population,
            field,
            floor,
            rng,
            generation,
            score: 0,
            frame: 0,
            status,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn score(&self) -> usize {
        self.score
    }

    /// Number of ticks simulated so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    #[cfg(test)]
    pub fn field(&self) -> &ObstacleField {
        &self.field
    }

    /// Fitness of every agent of the generation, indexed by id.
    pub fn fitness(&self) -> Vec<f64> {
        self.population.fitness()
    }

    /// End the generation early.
    pub fn stop(&mut self) {
        self.status = Status::Ended;
    }

    /// Advance the generation by one tick.
    ///
    /// Does nothing once the generation has ended.
    pub fn step(&mut self) -> Tick {
        let mut tick = Tick {
            status: self.status,
            eliminated: Vec::new(),
            passed: false,
        };
        if self.status == Status::Ended {
            return tick;
        }
        self.frame += 1;

        self.update_agents();

        self.floor.advance();

        self.field.advance();
        self.eliminate_colliding(&mut tick.eliminated);

        tick.passed = self.detect_passes();

        self.field.retire_offscreen();

        self.eliminate_out_of_bounds(&mut tick.eliminated);

        if self.population.is_empty() {
            log::debug!(
                "generation {} ended at frame {} with score {}",
                self.generation,
                self.frame,
                self.score
            );
            self.status = Status::Ended;
        }
        tick.status = self.status;
        tick
    }

    /// Index of the obstacle agents should aim for.
    ///
    /// The first obstacle, unless the leading agent is already past its
    /// right edge and a second one exists.
    pub fn active_obstacle(&self) -> usize {
        let pipe_width = self.cfg.sprites.pipe_width as f64;
        match (self.population.lead_x(), self.field.get(0)) {
            (Some(lead_x), Some(first)) if self.field.len() > 1 => {
                if lead_x > first.x() + pipe_width {
                    1
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    fn update_agents(&mut self) {
        let active = self.active_obstacle();
        let gap = self.field.get(active).map(|obs| (obs.height(), obs.bottom()));
        let agt_cfg = &self.cfg.agent;

        for member in self.population.members_mut() {
            member.reward(self.cfg.fitness.survival_reward);
            member.agent.advance(agt_cfg);

            let Some((gap_top, gap_bottom)) = gap else {
                continue;
            };
            let y = member.agent.y();
            let inputs = [y, (y - gap_top).abs(), (y - gap_bottom).abs()];
            let output = member.decide(&inputs);
            if output.first().is_some_and(|&out| out > agt_cfg.decision_threshold) {
                member.agent.jump(agt_cfg);
            }
        }
    }

    fn eliminate_colliding(&mut self, eliminated: &mut Vec<AgentId>) {
        let penalty = self.cfg.fitness.collision_penalty;
        for obstacle in self.field.obstacles() {
            let hits: Vec<AgentId> = self
                .population
                .members()
                .iter()
                .filter(|member| collides(&member.agent, obstacle, &self.masks))
                .map(|member| member.id())
                .collect();

            for id in hits {
                self.population.remove(id, penalty);
                log::debug!("{id} hit an obstacle at frame {}", self.frame);
                eliminated.push(id);
            }
        }
    }

    // Every obstacle behind the lead agent is marked, but a tick scores at most once.
    fn detect_passes(&mut self) -> bool {
        let Some(lead_x) = self.population.lead_x() else {
            return false;
        };
        if !self.field.mark_passed_before(lead_x) {
            return false;
        }

        self.score += 1;
        for member in self.population.members_mut() {
            member.reward(self.cfg.fitness.pass_bonus);
        }
        self.field.spawn(&mut self.rng);
        log::debug!("score {} at frame {}", self.score, self.frame);
        true
    }

    fn eliminate_out_of_bounds(&mut self, eliminated: &mut Vec<AgentId>) {
        let outside: Vec<AgentId> = self
            .population
            .members()
            .iter()
            .filter(|member| out_of_bounds(&member.agent, &self.masks, &self.cfg.world))
            .map(|member| member.id())
            .collect();

        for id in outside {
            self.population.remove(id, 0.0);
            log::debug!("{id} left the course at frame {}", self.frame);
            eliminated.push(id);
        }
    }

    /// Capture the state needed to draw the current frame.
    pub fn snapshot(&self) -> Snapshot {
        let agents = self
            .population
            .members()
            .iter()
            .map(|member| AgentView {
                id: member.id(),
                x: member.agent.x(),
                y: member.agent.y(),
                velocity: member.agent.velocity(&self.cfg.agent),
                tilt: member.agent.tilt(),
                frame: member.agent.frame(),
            })
            .collect();
        let obstacles = self
            .field
            .obstacles()
            .iter()
            .map(|obs| ObstacleView {
                x: obs.x(),
                height: obs.height(),
                top: obs.top(),
                bottom: obs.bottom(),
                passed: obs.passed(),
            })
            .collect();
        Snapshot {
            generation: self.generation,
            frame: self.frame,
            score: self.score,
            alive: self.population.len(),
            floor_x: self.floor.tiles(),
            agents,
            obstacles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn never() -> Box<dyn Decide> {
        Box::new(|_: &[f64]| vec![-1.0])
    }

    fn always() -> Box<dyn Decide> {
        Box::new(|_: &[f64]| vec![1.0])
    }

    fn hover_above(level: f64) -> Box<dyn Decide> {
        Box::new(move |inputs: &[f64]| vec![if inputs[0] > level { 1.0 } else { -1.0 }])
    }

    fn simulation(cfg: &Config, deciders: Vec<Box<dyn Decide>>, seed: u64) -> Simulation {
        Simulation::new(cfg, 1, deciders, ChaCha12Rng::seed_from_u64(seed))
    }

    fn floating_config(gap_height: i32) -> Config {
        let mut cfg = Config::default();
        cfg.agent.gravity = 0.0;
        cfg.obstacle.gap_min = gap_height;
        cfg.obstacle.gap_max = gap_height + 1;
        cfg
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn falling_agent_hits_the_floor() {
        let cfg = Config::default();
        let mut sim = simulation(&cfg, vec![never()], 0);

        let mut last = sim.step();
        while last.status == Status::Running {
            assert!(sim.frame() < 100);
            last = sim.step();
        }

        // 1.5 + 6 + 13.5 and then the terminal 16 per tick reach 716 after 25 ticks.
        assert_eq!(sim.frame(), 25);
        assert_eq!(last.eliminated, vec![AgentId(0)]);
        assert_eq!(sim.score(), 0);
        assert!(sim.population().is_empty());
        assert_close(sim.fitness()[0], 25.0 * 0.1);
    }

    #[test]
    fn jumper_and_faller_both_leave() {
        let cfg = Config::default();
        let mut sim = simulation(&cfg, vec![always(), never()], 0);

        let mut eliminated = Vec::new();
        while sim.status() == Status::Running {
            let tick = sim.step();
            eliminated.extend(tick.eliminated);
            assert!(sim.frame() < 100);
        }

        // The faller reaches the floor after 25 ticks; the jumper rises 11 per
        // tick from 351.5 and crosses the ceiling after 38.
        assert_eq!(eliminated, vec![AgentId(1), AgentId(0)]);
        assert_eq!(sim.frame(), 38);
        assert!(sim.population().is_empty());
        let fitness = sim.fitness();
        assert_close(fitness[0], 3.8);
        assert_close(fitness[1], 2.5);

        let ended = sim.step();
        assert_eq!(ended.status, Status::Ended);
        assert_eq!(sim.frame(), 38);
    }

    #[test]
    fn passing_rewards_survivors_once() {
        let cfg = floating_config(300);
        let mut sim = simulation(&cfg, vec![never()], 0);

        let mut passes = Vec::new();
        for _ in 0..200 {
            let tick = sim.step();
            assert_eq!(tick.status, Status::Running);
            assert!(tick.eliminated.is_empty());
            if tick.passed {
                passes.push(sim.frame());
                let spawned = sim.field().obstacles().last().expect("field is empty");
                assert_eq!(spawned.x(), cfg.obstacle.spawn_x);
                assert!(!spawned.passed());
            }
        }

        // First obstacle: 700 - 5 * 95 < 230; second: 600 - 5 * 75 < 230.
        assert_eq!(passes, vec![95, 170]);
        assert_eq!(sim.score(), 2);
        assert_close(sim.fitness()[0], 200.0 * 0.1 + 2.0 * 5.0);
        assert_eq!(sim.field().len(), 2);
    }

    #[test]
    fn at_most_one_pass_per_tick() {
        // Obstacles spawned behind the agent are passed on the following tick.
        let mut cfg = floating_config(300);
        cfg.obstacle.spawn_x = 100.0;
        let mut sim = simulation(&cfg, vec![never()], 0);

        let mut passes = Vec::new();
        for _ in 0..100 {
            let tick = sim.step();
            assert!(tick.eliminated.is_empty());
            if tick.passed {
                passes.push(sim.frame());
            }
        }

        assert_eq!(passes, (95..=100).collect::<Vec<_>>());
        assert_eq!(sim.score(), 6);
        assert_eq!(sim.field().len(), 7);
        assert_close(sim.fitness()[0], 100.0 * 0.1 + 6.0 * 5.0);
    }

    #[test]
    fn active_obstacle_moves_on_after_the_first() {
        let cfg = floating_config(300);
        let mut sim = simulation(&cfg, vec![never()], 0);
        for _ in 0..114 {
            sim.step();
            assert_eq!(sim.active_obstacle(), 0);
        }
        // Right edge of the first obstacle is at 125 + 104 < 230.
        sim.step();
        assert_eq!(sim.field().obstacles()[0].x(), 125.0);
        assert_eq!(sim.active_obstacle(), 1);
    }

    #[test]
    fn collision_applies_penalty_and_removes() {
        let cfg = floating_config(100);
        let mut sim = simulation(&cfg, vec![never()], 0);

        let mut last = sim.step();
        while last.status == Status::Running {
            assert!(sim.frame() < 200);
            last = sim.step();
        }

        // The beak meets the pipe body when the obstacle reaches x = 255.
        assert_eq!(sim.frame(), 89);
        assert_eq!(last.eliminated, vec![AgentId(0)]);
        assert_close(sim.fitness()[0], 8.9 - 1.0);
    }

    #[test]
    fn stop_ends_the_generation() {
        let cfg = Config::default();
        let mut sim = simulation(&cfg, vec![never(), always()], 0);
        sim.step();
        sim.stop();
        assert_eq!(sim.status(), Status::Ended);
        let tick = sim.step();
        assert_eq!(tick.status, Status::Ended);
        assert_eq!(sim.frame(), 1);
        assert_eq!(sim.population().len(), 2);
    }

    #[test]
    fn empty_generation_starts_ended() {
        let cfg = Config::default();
        let sim = simulation(&cfg, Vec::new(), 0);
        assert_eq!(sim.status(), Status::Ended);
        assert!(sim.fitness().is_empty());
    }

    #[test]
    fn fitness_changes_by_known_amounts() {
        let cfg = Config::default();
        let fit = &cfg.fitness;
        for seed in 0..5 {
            let deciders = (0..20)
                .map(|idx| hover_above(200.0 + 20.0 * idx as f64))
                .collect();
            let mut sim = simulation(&cfg, deciders, seed);

            let mut prev = sim.fitness();
            while sim.status() == Status::Running && sim.frame() < 2000 {
                let alive_before = sim.population().len();
                let tick = sim.step();
                let fitness = sim.fitness();

                assert_eq!(alive_before, sim.population().len() + tick.eliminated.len());
                assert_eq!(sim.population().n_born(), fitness.len());

                let bonus = if tick.passed { fit.pass_bonus } else { 0.0 };
                for member in sim.population().members() {
                    let id = member.id().0;
                    assert_close(fitness[id] - prev[id], fit.survival_reward + bonus);
                }
                for id in &tick.eliminated {
                    let delta = fitness[id.0] - prev[id.0];
                    let survived = fit.survival_reward + bonus;
                    let crashed = fit.survival_reward - fit.collision_penalty;
                    assert!(
                        (delta - survived).abs() < 1e-9 || (delta - crashed).abs() < 1e-9,
                        "unexpected change {delta}"
                    );
                }
                prev = fitness;
            }
        }
    }

    #[test]
    fn snapshot_reflects_state() {
        let cfg = Config::default();
        let mut sim = simulation(&cfg, vec![never(), always(), never()], 4);
        for _ in 0..10 {
            sim.step();
        }
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.frame, 10);
        assert_eq!(snapshot.alive, 3);
        assert_eq!(snapshot.agents.len(), 3);
        assert_eq!(snapshot.agents[1].id, AgentId(1));
        assert!(snapshot.agents[1].y < snapshot.agents[0].y);
        assert_eq!(snapshot.agents[0].velocity, 30.0);
        assert_eq!(snapshot.agents[1].velocity, cfg.agent.jump_velocity);
        assert_eq!(snapshot.agents[0].y, snapshot.agents[2].y);
        assert_eq!(snapshot.obstacles.len(), 1);
        assert_eq!(snapshot.obstacles[0].x, 650.0);
        assert_eq!(snapshot.floor_x, (-50.0, 622.0));
    }
}
