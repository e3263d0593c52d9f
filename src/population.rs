//! Agents paired with their decision functions and fitness.

use crate::agent::Agent;
use crate::config::AgentConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision function supplied by the optimiser.
///
/// Maps an observation vector to an output vector whose first element is
/// compared against the jump threshold.
pub trait Decide {
    fn activate(&self, inputs: &[f64]) -> Vec<f64>;
}

impl<F> Decide for F
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    fn activate(&self, inputs: &[f64]) -> Vec<f64> {
        self(inputs)
    }
}

/// Identity of an agent within one generation.
///
/// Equal to the position of its decision function in the list the
/// population was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// A living agent with everything that belongs to it.
pub struct Member {
    id: AgentId,
    pub agent: Agent,
    decider: Box<dyn Decide>,
    fitness: f64,
}

impl Member {
    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn reward(&mut self, delta: f64) {
        self.fitness += delta;
    }

    pub fn penalize(&mut self, delta: f64) {
        self.fitness -= delta;
    }

    /// Query the decision function.
    pub fn decide(&self, inputs: &[f64]) -> Vec<f64> {
        self.decider.activate(inputs)
    }
}

/// Living agents of a generation plus the final fitness of eliminated ones.
///
/// Each agent lives in a single [`Member`] record, so removing it removes its
/// kinematic state, decision function and fitness together.
pub struct Population {
    members: Vec<Member>,
    retired: Vec<Option<f64>>,
}

impl Population {
    /// Create one agent per decision function, all at the start position.
    pub fn new(deciders: Vec<Box<dyn Decide>>, cfg: &AgentConfig) -> Self {
        let n_agents = deciders.len();
        let members = deciders
            .into_iter()
            .enumerate()
            .map(|(idx, decider)| Member {
                id: AgentId(idx),
                agent: Agent::new(cfg),
                decider,
                fitness: 0.0,
            })
            .collect();
        Self {
            members,
            retired: vec![None; n_agents],
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total number of agents born in this generation.
    pub fn n_born(&self) -> usize {
        self.retired.len()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Member] {
        &mut self.members
    }

    /// Remove the agent with the given id after subtracting `penalty` from
    /// its fitness, which is then frozen.
    ///
    /// Returns false if no living agent has that id.
    pub fn remove(&mut self, id: AgentId, penalty: f64) -> bool {
        let Some(idx) = self.members.iter().position(|member| member.id == id) else {
            return false;
        };
        let mut member = self.members.remove(idx);
        member.penalize(penalty);
        self.retired[id.0] = Some(member.fitness());
        true
    }

    /// Largest horizontal position among living agents.
    pub fn lead_x(&self) -> Option<f64> {
        self.members
            .iter()
            .map(|member| member.agent.x())
            .reduce(f64::max)
    }

    /// Fitness of every agent born in this generation, indexed by id.
    pub fn fitness(&self) -> Vec<f64> {
        let mut fitness: Vec<f64> = self.retired.iter().map(|fit| fit.unwrap_or(0.0)).collect();
        for member in &self.members {
            fitness[member.id.0] = member.fitness();
        }
        fitness
    }
}
