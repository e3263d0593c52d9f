//! Agent kinematics.

use crate::config::AgentConfig;
use serde::{Deserialize, Serialize};

/// Frames of one flap cycle, each held for `animation_ticks` ticks.
///
/// The tick after the cycle shows frame 0 once more and restarts the count,
/// so from the second cycle on frame 0 is held one tick longer.
const FLAP_CYCLE: [usize; 4] = [0, 1, 2, 1];

/// Wing-level frame shown while nose-diving.
const GLIDE_FRAME: usize = 1;

/// A simulated bird.
///
/// The agent never moves horizontally; the world scrolls past it.
/// Each jump starts a new parabolic arc: the displacement of every tick is
/// computed from the number of ticks since the jump, not integrated from the
/// previous velocity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    x: f64,
    y: f64,
    vel: f64,
    tick_count: u32,
    height: f64,
    tilt: f64,
    anim_count: u32,
    frame: usize,
}

impl Agent {
    /// Create an agent at rest at the configured start position.
    pub fn new(cfg: &AgentConfig) -> Self {
        Self {
            x: cfg.start_x,
            y: cfg.start_y,
            vel: 0.0,
            tick_count: 0,
            height: cfg.start_y,
            tilt: 0.0,
            anim_count: 0,
            frame: 0,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Tilt in degrees (positive is nose up).
    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    /// Current animation frame, which selects the collision silhouette.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Instantaneous vertical velocity of the current arc.
    pub fn velocity(&self, cfg: &AgentConfig) -> f64 {
        self.vel + cfg.gravity * self.tick_count as f64
    }

    /// Start a new upward arc.
    pub fn jump(&mut self, cfg: &AgentConfig) {
        self.vel = cfg.jump_velocity;
        self.tick_count = 0;
        self.height = self.y;
    }

    /// Advance the agent by one tick.
    pub fn advance(&mut self, cfg: &AgentConfig) {
        self.tick_count += 1;

        let mut disp = displacement(cfg, self.vel, self.tick_count);
        if disp < 0.0 {
            disp -= cfg.lift_bonus;
        }
        self.y += disp;

        if disp < 0.0 || self.y < self.height + cfg.apex_buffer {
            self.tilt = self.tilt.max(cfg.max_tilt);
        } else {
            self.tilt = (self.tilt - cfg.tilt_rate).max(cfg.min_tilt);
        }

        self.animate(cfg);
    }

    fn animate(&mut self, cfg: &AgentConfig) {
        let ticks = cfg.animation_ticks;
        self.anim_count += 1;
        if self.anim_count <= ticks * FLAP_CYCLE.len() as u32 {
            self.frame = FLAP_CYCLE[((self.anim_count - 1) / ticks) as usize];
        } else {
            self.frame = FLAP_CYCLE[0];
            self.anim_count = 0;
        }

        if self.tilt <= cfg.nose_dive_tilt {
            self.frame = GLIDE_FRAME;
            self.anim_count = 2 * ticks;
        }
    }
}

/// Displacement of the `t`-th tick of an arc started with velocity `vel`.
///
/// The magnitude is clamped to the terminal displacement, keeping the sign.
pub fn displacement(cfg: &AgentConfig, vel: f64, t: u32) -> f64 {
    let t = t as f64;
    let disp = vel * t + 0.5 * cfg.gravity * t * t;
    if disp.abs() > cfg.terminal_displacement {
        cfg.terminal_displacement.copysign(disp)
    } else {
        disp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_follows_arc() {
        let cfg = AgentConfig::default();
        assert_eq!(displacement(&cfg, 0.0, 0), 0.0);
        assert_eq!(displacement(&cfg, 0.0, 1), 1.5);
        assert_eq!(displacement(&cfg, 0.0, 2), 6.0);
        assert_eq!(displacement(&cfg, -10.5, 1), -9.0);
        assert_eq!(displacement(&cfg, -10.5, 7), 0.0);
        assert_eq!(displacement(&cfg, -10.5, 3), -16.0);
        assert_eq!(displacement(&cfg, 0.0, 10), 16.0);
    }

    #[test]
    fn displacement_is_bounded() {
        let cfg = AgentConfig::default();
        for vel in [-10.5, 0.0, 10.5, -1000.0] {
            for t in 0..500 {
                let disp = displacement(&cfg, vel, t);
                assert!(disp.abs() <= cfg.terminal_displacement, "{vel} {t} {disp}");
                assert_eq!(disp, displacement(&cfg, vel, t));
            }
        }
    }

    #[test]
    fn jump_resets_velocity() {
        let cfg = AgentConfig::default();
        let mut agent = Agent::new(&cfg);
        for _ in 0..5 {
            agent.advance(&cfg);
        }
        assert!(agent.velocity(&cfg) > 0.0);

        agent.jump(&cfg);
        assert_eq!(agent.velocity(&cfg), cfg.jump_velocity);

        let y = agent.y();
        agent.advance(&cfg);
        assert_eq!(agent.y(), y - 9.0 - cfg.lift_bonus);
        assert_eq!(agent.tilt(), cfg.max_tilt);
    }

    #[test]
    fn x_never_changes() {
        let cfg = AgentConfig::default();
        let mut agent = Agent::new(&cfg);
        for i in 0..100 {
            if i % 7 == 0 {
                agent.jump(&cfg);
            }
            agent.advance(&cfg);
            assert_eq!(agent.x(), cfg.start_x);
        }
    }

    #[test]
    fn falling_agent_nose_dives() {
        let cfg = AgentConfig::default();
        let mut agent = Agent::new(&cfg);
        let mut prev_tilt = f64::INFINITY;
        for _ in 0..40 {
            agent.advance(&cfg);
            assert!(agent.tilt() >= cfg.min_tilt);
            if agent.y() >= cfg.start_y + cfg.apex_buffer {
                assert!(agent.tilt() <= prev_tilt);
            }
            prev_tilt = agent.tilt();
        }
        assert_eq!(agent.tilt(), cfg.min_tilt);
        assert_eq!(agent.frame(), GLIDE_FRAME);
    }

    #[test]
    fn hovering_agent_flaps() {
        let cfg = AgentConfig::default();
        let ticks = cfg.animation_ticks as usize;
        let mut expected = Vec::new();
        for (frame, n_ticks) in [
            (0, ticks),
            (1, ticks),
            (2, ticks),
            (1, ticks),
            (0, ticks + 1),
            (1, ticks),
            (2, ticks),
            (1, ticks),
            (0, 1),
        ] {
            expected.extend(std::iter::repeat_n(frame, n_ticks));
        }

        let mut agent = Agent::new(&cfg);
        let mut frames = Vec::new();
        for _ in 0..expected.len() {
            agent.jump(&cfg);
            agent.advance(&cfg);
            frames.push(agent.frame());
        }
        assert_eq!(frames, expected);
        // Tick 26 still shows the first frame of the second cycle.
        assert_eq!(frames[25], 0);
        assert_eq!(frames[26], 1);
    }

    #[test]
    fn flapping_resumes_after_nose_dive() {
        let cfg = AgentConfig::default();
        let mut agent = Agent::new(&cfg);
        while agent.tilt() > cfg.nose_dive_tilt {
            agent.advance(&cfg);
        }
        assert_eq!(agent.frame(), GLIDE_FRAME);

        agent.jump(&cfg);
        agent.advance(&cfg);
        assert_eq!(agent.tilt(), cfg.max_tilt);
        assert_eq!(agent.frame(), 2);
    }
}
