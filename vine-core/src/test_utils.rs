use crate::{
    env::{DoneFn, Env, EnvironmentDescription, RewardFn, SnapShot, Space, TransitionFns},
    model::{DynamicsModel, PredictionType},
};
use anyhow::Result;
use candle_core::{DType, Device, IndexOp, Tensor};
use std::sync::{Arc, Mutex};

/// Reward of a row is the sum of its action entries.
pub struct ActionSumReward;

impl RewardFn for ActionSumReward {
    fn reward(&self, _prev_obs: &Tensor, action: &Tensor, _next_obs: &Tensor) -> Result<Tensor> {
        Ok(action.sum(1)?)
    }
}

/// The `(prev_obs, action, next_obs)` batches handed to a reward fn.
#[derive(Debug, Clone)]
pub struct RewardCall {
    pub prev_obs: Tensor,
    pub action: Tensor,
    pub next_obs: Tensor,
}

/// Pays like [`ActionSumReward`] and keeps every batch it was called with.
#[derive(Debug, Clone, Default)]
pub struct RecordingReward {
    calls: Arc<Mutex<Vec<RewardCall>>>,
}

impl RecordingReward {
    pub fn calls(&self) -> Vec<RewardCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl RewardFn for RecordingReward {
    fn reward(&self, prev_obs: &Tensor, action: &Tensor, next_obs: &Tensor) -> Result<Tensor> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("reward recorder poisoned"))?
            .push(RewardCall {
                prev_obs: prev_obs.clone(),
                action: action.clone(),
                next_obs: next_obs.clone(),
            });
        ActionSumReward.reward(prev_obs, action, next_obs)
    }
}

/// Done once the first observation entry exceeds a threshold.
pub struct FirstEntryAbove(pub f32);

impl DoneFn for FirstEntryAbove {
    fn done(&self, next_obs: &Tensor) -> Result<Vec<bool>> {
        let first = next_obs.i((.., 0))?.to_vec1::<f32>()?;
        Ok(first.into_iter().map(|x| x > self.0).collect())
    }
}

/// Every reset returns a constant vector holding the number of earlier resets.
pub struct ScriptedEnv {
    pub obs_dim: usize,
    pub act_dim: usize,
    pub resets: usize,
    pub done_above: Option<f32>,
    pub with_reward: bool,
    pub recorder: Option<RecordingReward>,
    state: Option<Tensor>,
}

impl ScriptedEnv {
    pub fn new(obs_dim: usize, act_dim: usize) -> Self {
        Self {
            obs_dim,
            act_dim,
            resets: 0,
            done_above: None,
            with_reward: true,
            recorder: None,
            state: None,
        }
    }

    pub fn with_done_above(mut self, threshold: f32) -> Self {
        self.done_above = Some(threshold);
        self
    }

    pub fn with_recorder(mut self, recorder: RecordingReward) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn without_reward(mut self) -> Self {
        self.with_reward = false;
        self
    }
}

impl Env for ScriptedEnv {
    fn reset(&mut self) -> Result<Tensor> {
        let obs = Tensor::full(self.resets as f32, self.obs_dim, &Device::Cpu)?;
        self.resets += 1;
        self.state = Some(obs.clone());
        Ok(obs)
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot<Tensor>> {
        let state = match self.state.clone() {
            Some(state) => (state + 1.)?,
            None => self.reset()?,
        };
        let reward = action.sum_all()?.to_scalar::<f32>()?;
        let terminated = match self.done_above {
            Some(threshold) => state.get(0)?.to_scalar::<f32>()? > threshold,
            None => false,
        };
        self.state = Some(state.clone());
        Ok(SnapShot {
            state,
            reward,
            terminated,
            trancuated: false,
        })
    }

    fn env_description(&self) -> EnvironmentDescription<Tensor> {
        EnvironmentDescription::new(
            Space::continous_from_dims(vec![self.obs_dim]),
            Space::continous_from_dims(vec![self.act_dim]),
        )
    }

    fn transition_fns(&self) -> Option<TransitionFns> {
        if !self.with_reward {
            return None;
        }
        let reward: Arc<dyn RewardFn> = match &self.recorder {
            Some(recorder) => Arc::new(recorder.clone()),
            None => Arc::new(ActionSumReward),
        };
        Some(match self.done_above {
            Some(threshold) => TransitionFns::RewardAndDone {
                reward,
                done: Arc::new(FirstEntryAbove(threshold)),
            },
            None => TransitionFns::Reward(reward),
        })
    }
}

/// Passes everything through to the wrapped env and exposes it via `wrapped_env`.
pub struct PassThrough<E: Env>(pub E);

impl<E: Env> Env for PassThrough<E> {
    fn reset(&mut self) -> Result<Tensor> {
        self.0.reset()
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot<Tensor>> {
        self.0.step(action)
    }

    fn env_description(&self) -> EnvironmentDescription<Tensor> {
        self.0.env_description()
    }

    fn wrapped_env(&self) -> Option<&dyn Env> {
        Some(&self.0)
    }
}

/// Member `k` predicts `obs + (k + 1)`, so every prediction names the member that made it.
pub struct OffsetEnsemble {
    pub num_models: usize,
}

impl OffsetEnsemble {
    pub fn expected(obs: &Tensor, model_idx: usize) -> candle_core::Result<Tensor> {
        obs + (model_idx + 1) as f64
    }
}

impl DynamicsModel for OffsetEnsemble {
    fn num_models(&self) -> usize {
        self.num_models
    }

    fn predict(&self, obs: &Tensor, _action: &Tensor, pred_type: PredictionType) -> Result<Tensor> {
        let obs = obs.to_dtype(DType::F32)?;
        let members = (0..self.num_models)
            .map(|k| Self::expected(&obs, k))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let all = Tensor::stack(&members, 2)?;
        Ok(match pred_type {
            PredictionType::All => all,
            PredictionType::Mean => all.mean(2)?,
        })
    }
}
