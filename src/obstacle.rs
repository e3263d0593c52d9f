//! Scrolling obstacles and floor.

use crate::config::{Config, ObstacleConfig, SpriteConfig, WorldConfig};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// A pair of pipes with a passable gap between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    x: f64,
    height: f64,
    top: f64,
    bottom: f64,
    passed: bool,
}

impl Obstacle {
    /// Create an obstacle at `x` with a random gap height.
    pub fn new<R: Rng>(x: f64, obs: &ObstacleConfig, spr: &SpriteConfig, rng: &mut R) -> Self {
        let height = rng.random_range(obs.gap_min..obs.gap_max) as f64;
        Self {
            x,
            height,
            top: height - spr.pipe_height as f64,
            bottom: height + obs.gap,
            passed: false,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    /// Gap centre: the bottom edge of the top pipe.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Vertical position of the top pipe's upper edge.
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Vertical position of the bottom pipe's upper edge.
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Whether the obstacle has scrolled fully past the left edge.
    pub fn is_offscreen(&self, spr: &SpriteConfig) -> bool {
        self.x + (spr.pipe_width as f64) < 0.0
    }

    /// Mark the obstacle as passed; returns false if it already was.
    pub fn mark_passed(&mut self) -> bool {
        !std::mem::replace(&mut self.passed, true)
    }
}

/// Obstacles currently on the course, in spawn order.
#[derive(Debug, Clone)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
    obs: ObstacleConfig,
    spr: SpriteConfig,
}

impl ObstacleField {
    /// Create a field holding the first obstacle of a generation.
    pub fn new<R: Rng>(cfg: &Config, rng: &mut R) -> Self {
        let first = Obstacle::new(cfg.obstacle.first_spawn_x, &cfg.obstacle, &cfg.sprites, rng);
        Self {
            obstacles: vec![first],
            obs: cfg.obstacle.clone(),
            spr: cfg.sprites.clone(),
        }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Obstacle> {
        self.obstacles.get(idx)
    }

    /// Scroll every obstacle left by one tick.
    pub fn advance(&mut self) {
        for obstacle in &mut self.obstacles {
            obstacle.x -= self.obs.velocity;
        }
    }

    /// Append a new obstacle at the right edge.
    pub fn spawn<R: Rng>(&mut self, rng: &mut R) {
        let obstacle = Obstacle::new(self.obs.spawn_x, &self.obs, &self.spr, rng);
        self.obstacles.push(obstacle);
    }

    /// Mark every unpassed obstacle left of `x` as passed.
    ///
    /// Returns true if at least one obstacle was newly passed.
    pub fn mark_passed_before(&mut self, x: f64) -> bool {
        let mut any_passed = false;
        for obstacle in &mut self.obstacles {
            if obstacle.x < x && obstacle.mark_passed() {
                any_passed = true;
            }
        }
        any_passed
    }

    /// Remove every obstacle that has scrolled off screen.
    ///
    /// Returns the number of obstacles removed.
    pub fn retire_offscreen(&mut self) -> usize {
        let n_before = self.obstacles.len();
        let spr = &self.spr;
        self.obstacles.retain(|obstacle| !obstacle.is_offscreen(spr));
        n_before - self.obstacles.len()
    }
}

/// Two floor tiles scrolling in a loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Floor {
    x1: f64,
    x2: f64,
    width: f64,
    velocity: f64,
}

impl Floor {
    pub fn new(cfg: &WorldConfig) -> Self {
        Self {
            x1: 0.0,
            x2: cfg.floor_width,
            width: cfg.floor_width,
            velocity: cfg.floor_velocity,
        }
    }

    /// Horizontal positions of both tiles.
    pub fn tiles(&self) -> (f64, f64) {
        (self.x1, self.x2)
    }

    pub fn advance(&mut self) {
        self.x1 -= self.velocity;
        self.x2 -= self.velocity;
        if self.x1 + self.width < 0.0 {
            self.x1 = self.x2 + self.width;
        }
        if self.x2 + self.width < 0.0 {
            self.x2 = self.x1 + self.width;
        }
    }
}
