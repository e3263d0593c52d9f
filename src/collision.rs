//! Pixel-accurate collision and out-of-bounds checks.

use crate::agent::Agent;
use crate::config::WorldConfig;
use crate::mask::SpriteMasks;
use crate::obstacle::Obstacle;

/// Check whether the agent's silhouette touches either pipe of the obstacle.
pub fn collides(agent: &Agent, obstacle: &Obstacle, masks: &SpriteMasks) -> bool {
    let bird = masks.bird(agent.frame());
    let agent_y = agent.y().round();
    let dx = (obstacle.x() - agent.x()).round() as i64;
    let top_dy = (obstacle.top() - agent_y).round() as i64;
    let bottom_dy = (obstacle.bottom() - agent_y).round() as i64;

    bird.overlap(masks.pipe_bottom(), (dx, bottom_dy)).is_some()
        || bird.overlap(masks.pipe_top(), (dx, top_dy)).is_some()
}

/// Check whether the agent has hit the floor or flown above the ceiling.
pub fn out_of_bounds(agent: &Agent, masks: &SpriteMasks, cfg: &WorldConfig) -> bool {
    let sprite_height = masks.bird(agent.frame()).height() as f64;
    agent.y() + sprite_height - cfg.floor_inset >= cfg.floor_y || agent.y() < cfg.ceiling_y
}
