use anyhow::Result;
use candle_core::Tensor;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Space<T> {
    Discrete(usize),
    Continous {
        min: Option<T>,
        max: Option<T>,
        size: usize,
    },
}

impl<T> Space<T> {
    pub fn continous_from_dims(dims: Vec<usize>) -> Self {
        Self::Continous {
            min: None,
            max: None,
            size: dims.iter().product(),
        }
    }

    pub fn size(&self) -> usize {
        match &self {
            Self::Discrete(size) => *size,
            Self::Continous { size, .. } => *size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentDescription<T> {
    pub observation_space: Space<T>,
    pub action_space: Space<T>,
}

impl<T> EnvironmentDescription<T> {
    pub fn new(observation_space: Space<T>, action_space: Space<T>) -> Self {
        Self {
            observation_space,
            action_space,
        }
    }
}

pub struct SnapShot<T> {
    pub state: T,
    pub reward: f32,
    pub terminated: bool,
    pub trancuated: bool,
}

/// Batched reward of predicted transitions. Must not touch any simulator state.
pub trait RewardFn {
    /// Returns one reward per row of the `[batch, dim]` inputs.
    fn reward(&self, prev_obs: &Tensor, action: &Tensor, next_obs: &Tensor) -> Result<Tensor>;
}

/// Batched termination check of predicted next observations.
pub trait DoneFn {
    fn done(&self, next_obs: &Tensor) -> Result<Vec<bool>>;
}

/// What an environment can compute about a transition without stepping its simulator.
#[derive(Clone)]
pub enum TransitionFns {
    Reward(Arc<dyn RewardFn>),
    RewardAndDone {
        reward: Arc<dyn RewardFn>,
        done: Arc<dyn DoneFn>,
    },
}

impl TransitionFns {
    pub fn reward(&self, prev_obs: &Tensor, action: &Tensor, next_obs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Reward(reward) | Self::RewardAndDone { reward, .. } => {
                reward.reward(prev_obs, action, next_obs)
            }
        }
    }

    /// `None` when the environment has no notion of termination on its own.
    pub fn done(&self, next_obs: &Tensor) -> Option<Result<Vec<bool>>> {
        match self {
            Self::Reward(_) => None,
            Self::RewardAndDone { done, .. } => Some(done.done(next_obs)),
        }
    }

    pub fn has_done_fn(&self) -> bool {
        matches!(self, Self::RewardAndDone { .. })
    }
}

pub trait Env {
    fn reset(&mut self) -> Result<Tensor>;
    fn step(&mut self, action: &Tensor) -> Result<SnapShot<Tensor>>;
    fn env_description(&self) -> EnvironmentDescription<Tensor>;

    /// The decorated environment, for wrappers.
    fn wrapped_env(&self) -> Option<&dyn Env> {
        None
    }

    fn transition_fns(&self) -> Option<TransitionFns> {
        None
    }
}

/// Follows the `wrapped_env` chain down to the environment that wraps nothing.
pub fn innermost_env(env: &dyn Env) -> &dyn Env {
    let mut current = env;
    while let Some(inner) = current.wrapped_env() {
        current = inner;
    }
    current
}
