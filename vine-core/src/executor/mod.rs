pub mod shards;
pub mod state;

use crate::{
    env::{Env, Space, TransitionFns, innermost_env},
    error::{ExecutorError, Result},
    infos::{EnvInfo, StackedEnvInfos, stack_env_infos},
    model::{DynamicsModel, PredictionType},
};
use candle_core::{IndexOp, Tensor};
use shards::ShardPlan;
use state::{BatchState, as_f32_vec};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelVecEnvConfig {
    pub n_parallel: usize,
    pub max_path_length: Option<usize>,
}

impl Default for ModelVecEnvConfig {
    fn default() -> Self {
        Self {
            n_parallel: 1,
            max_path_length: None,
        }
    }
}

impl ModelVecEnvConfig {
    pub fn with_n_parallel(mut self, n_parallel: usize) -> Self {
        self.n_parallel = n_parallel;
        self
    }

    pub fn with_max_path_length(mut self, max_path_length: usize) -> Self {
        self.max_path_length = Some(max_path_length);
        self
    }

    pub fn build<E: Env, M: DynamicsModel>(self, env: E, model: M) -> Result<ModelVecEnv<E, M>> {
        ModelVecEnv::new(env, model, self)
    }
}

/// Per-slot results of one batched model step, in slot order.
#[derive(Debug)]
pub struct ModelStep {
    pub observations: Vec<Tensor>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub infos: StackedEnvInfos,
}

/// Steps `n_parallel` imagined trajectories through an ensemble of learned dynamics models.
///
/// Slots are split into one contiguous shard per ensemble member, and each shard only ever sees
/// its own member's prediction. Rewards and terminations come from the real environment's
/// transition functions applied to the predicted transitions. Finished slots restart from the
/// observation they had after the last `reset`.
pub struct ModelVecEnv<E: Env, M: DynamicsModel> {
    env: E,
    model: M,
    transition_fns: TransitionFns,
    shards: ShardPlan,
    max_path_length: Option<usize>,
    action_space: Space<Tensor>,
    observation_space: Space<Tensor>,
    state: Option<BatchState>,
}

impl<E: Env, M: DynamicsModel> ModelVecEnv<E, M> {
    pub fn new(env: E, model: M, config: ModelVecEnvConfig) -> Result<Self> {
        let ModelVecEnvConfig {
            n_parallel,
            max_path_length,
        } = config;
        if max_path_length == Some(0) {
            return Err(ExecutorError::ZeroHorizon);
        }
        let shards = ShardPlan::new(n_parallel, model.num_models())?;
        let transition_fns = innermost_env(&env)
            .transition_fns()
            .ok_or(ExecutorError::MissingRewardFn)?;
        let description = env.env_description();
        debug!(
            n_parallel,
            num_models = shards.num_models(),
            ?max_path_length,
            has_done_fn = transition_fns.has_done_fn(),
            "built model vec env"
        );
        Ok(Self {
            env,
            model,
            transition_fns,
            shards,
            max_path_length,
            action_space: description.action_space,
            observation_space: description.observation_space,
            state: None,
        })
    }

    pub fn reset(&mut self) -> Result<Vec<Tensor>> {
        let observations = (0..self.shards.n_parallel())
            .map(|_| self.env.reset())
            .collect::<anyhow::Result<Vec<_>>>()?;
        let state = BatchState::from_reset(&observations)?;
        debug!(
            n_parallel = state.n_slots(),
            obs_shape = ?state.current_obs.dims(),
            "reset model vec env"
        );
        self.state = Some(state);
        Ok(observations)
    }

    pub fn step(&mut self, actions: &Tensor) -> Result<ModelStep> {
        let n_parallel = self.shards.n_parallel();
        let state = self.state.as_ref().ok_or(ExecutorError::NotReset)?;
        let got = actions.dims().first().copied().unwrap_or(0);
        if got != n_parallel {
            return Err(ExecutorError::ActionBatchMismatch {
                expected: n_parallel,
                got,
            });
        }
        let prev_obs = &state.current_obs;
        let predicted = self
            .shards
            .shards()
            .map(|shard| -> Result<Tensor> {
                let obs = prev_obs.narrow(0, shard.slots.start, shard.len())?;
                let act = actions.narrow(0, shard.slots.start, shard.len())?;
                let all = self.model.predict(&obs, &act, PredictionType::All)?;
                Ok(all.i((.., .., shard.model_idx))?.contiguous()?)
            })
            .collect::<Result<Vec<_>>>()?;
        let next_obs = Tensor::cat(&predicted, 0)?;

        let rewards = as_f32_vec(&self.transition_fns.reward(prev_obs, actions, &next_obs)?)?;
        check_len("rewards", n_parallel, rewards.len())?;
        let dones = match self.transition_fns.done(&next_obs) {
            Some(dones) => dones?,
            None => vec![false; n_parallel],
        };
        check_len("dones", n_parallel, dones.len())?;

        let pending = state.prepare(&next_obs, dones, self.max_path_length)?;
        let observations = (0..n_parallel)
            .map(|slot| pending.next_obs.get(slot))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let infos = stack_env_infos(&vec![EnvInfo::new(); n_parallel])?;
        if let Some(state) = self.state.as_mut() {
            state.apply(&pending);
        }
        trace!(
            n_done = pending.dones.iter().filter(|d| **d).count(),
            "model vec env step"
        );
        Ok(ModelStep {
            observations,
            rewards,
            dones: pending.dones,
            infos,
        })
    }

    pub fn num_envs(&self) -> usize {
        self.shards.n_parallel()
    }

    pub fn action_space(&self) -> &Space<Tensor> {
        &self.action_space
    }

    pub fn observation_space(&self) -> &Space<Tensor> {
        &self.observation_space
    }

    pub fn max_path_length(&self) -> Option<usize> {
        self.max_path_length
    }

    pub fn shard_plan(&self) -> &ShardPlan {
        &self.shards
    }

    /// `None` until the first `reset`.
    pub fn batch_state(&self) -> Option<&BatchState> {
        self.state.as_ref()
    }

    /// Hook for tearing down external resources. Nothing is held here.
    pub fn terminate(&mut self) {
        debug!("terminated model vec env");
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(ExecutorError::BatchLength {
            what,
            expected,
            got,
        })
    }
}
