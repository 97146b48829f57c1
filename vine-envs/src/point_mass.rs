//! A one dimensional point mass pushed along a line, observed as `[position, velocity]`.

use crate::rand_params::{EnvParams, ParametrizedSim, SimParam};
use anyhow::{Context, Result, bail, ensure};
use candle_core::{DType, Device, IndexOp, Tensor};
use rand::{Rng, rngs::StdRng};
use std::sync::Arc;
use vine_core::{
    env::{DoneFn, Env, EnvironmentDescription, RewardFn, SnapShot, Space, TransitionFns},
    model::{DynamicsModel, PredictionType},
    rng::rng_from_seed,
};

const GRAVITY: f64 = 9.81;
const CTRL_COST: f64 = 0.1;
pub const DT: f32 = 0.05;
pub const POSITION_BOUND: f32 = 10.;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMassParams {
    pub mass: f64,
    pub damping: f64,
    pub friction: f64,
}

impl Default for PointMassParams {
    fn default() -> Self {
        Self {
            mass: 1.,
            damping: 0.1,
            friction: 0.05,
        }
    }
}

impl PointMassParams {
    pub fn from_env_params(params: &EnvParams) -> Result<Self> {
        let scalar = |param: SimParam| -> Result<f64> {
            params
                .get(&param)
                .and_then(|values| values.first().copied())
                .with_context(|| format!("missing {param}"))
        };
        Ok(Self {
            mass: scalar(SimParam::BodyMass)?,
            damping: scalar(SimParam::DofDamping)?,
            friction: scalar(SimParam::GeomFriction)?,
        })
    }

    /// Semi-implicit Euler step.
    pub fn integrate(&self, position: f32, velocity: f32, force: f32, dt: f32) -> [f32; 2] {
        let (v, f) = (velocity as f64, force.clamp(-1., 1.) as f64);
        let friction = if v == 0. {
            0.
        } else {
            self.friction * self.mass * GRAVITY * v.signum()
        };
        let acc = (f - self.damping * v - friction) / self.mass;
        let velocity = (v + dt as f64 * acc) as f32;
        [position + dt * velocity, velocity]
    }
}

pub struct PointMassReward;

impl RewardFn for PointMassReward {
    fn reward(&self, _prev_obs: &Tensor, action: &Tensor, next_obs: &Tensor) -> Result<Tensor> {
        let velocity = next_obs.to_dtype(DType::F32)?.i((.., 1))?;
        let force = action.to_dtype(DType::F32)?.i((.., 0))?.clamp(-1f32, 1f32)?;
        let ctrl = (force.sqr()? * CTRL_COST)?;
        Ok((velocity - ctrl)?)
    }
}

pub struct PointMassDone {
    pub bound: f32,
}

impl DoneFn for PointMassDone {
    fn done(&self, next_obs: &Tensor) -> Result<Vec<bool>> {
        let position = next_obs.to_dtype(DType::F32)?.i((.., 0))?.to_vec1::<f32>()?;
        Ok(position.into_iter().map(|p| p.abs() > self.bound).collect())
    }
}

pub struct PointMassEnv {
    params: PointMassParams,
    state: [f32; 2],
    rng: StdRng,
}

impl PointMassEnv {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            params: PointMassParams::default(),
            state: [0., 0.],
            rng: rng_from_seed(seed),
        }
    }

    pub fn params(&self) -> &PointMassParams {
        &self.params
    }

    fn observation(&self) -> Result<Tensor> {
        Ok(Tensor::new(&self.state, &Device::Cpu)?)
    }
}

impl Env for PointMassEnv {
    fn reset(&mut self) -> Result<Tensor> {
        self.state = [self.rng.random_range(-0.1..=0.1), 0.];
        self.observation()
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot<Tensor>> {
        let force = action.flatten_all()?.to_dtype(DType::F32)?.get(0)?.to_scalar::<f32>()?;
        let [position, velocity] = self.state;
        self.state = self.params.integrate(position, velocity, force, DT);
        let force = force.clamp(-1., 1.);
        let reward = self.state[1] - CTRL_COST as f32 * force * force;
        Ok(SnapShot {
            state: self.observation()?,
            reward,
            terminated: self.state[0].abs() > POSITION_BOUND,
            trancuated: false,
        })
    }

    fn env_description(&self) -> EnvironmentDescription<Tensor> {
        let bound = |v: f32| Tensor::full(v, 1, &Device::Cpu).ok();
        EnvironmentDescription::new(
            Space::continous_from_dims(vec![2]),
            Space::Continous {
                min: bound(-1.),
                max: bound(1.),
                size: 1,
            },
        )
    }

    fn transition_fns(&self) -> Option<TransitionFns> {
        Some(TransitionFns::RewardAndDone {
            reward: Arc::new(PointMassReward),
            done: Arc::new(PointMassDone {
                bound: POSITION_BOUND,
            }),
        })
    }
}

impl ParametrizedSim for PointMassEnv {
    fn randomizable_params(&self) -> Vec<SimParam> {
        vec![
            SimParam::BodyMass,
            SimParam::DofDamping,
            SimParam::GeomFriction,
        ]
    }

    fn sim_param(&self, param: SimParam) -> Result<Vec<f64>> {
        Ok(match param {
            SimParam::BodyMass => vec![self.params.mass],
            SimParam::DofDamping => vec![self.params.damping],
            SimParam::GeomFriction => vec![self.params.friction],
            SimParam::BodyInertia => bail!("point mass has no {param}"),
        })
    }

    fn set_sim_param(&mut self, param: SimParam, values: &[f64]) -> Result<()> {
        let [value] = values else {
            bail!("{param} expects a single value, got {}", values.len());
        };
        ensure!(value.is_finite(), "{param} must be finite, got {value}");
        match param {
            SimParam::BodyMass => {
                ensure!(*value > 0., "body mass must be positive, got {value}");
                self.params.mass = *value;
            }
            SimParam::DofDamping => self.params.damping = *value,
            SimParam::GeomFriction => self.params.friction = *value,
            SimParam::BodyInertia => bail!("point mass has no {param}"),
        }
        Ok(())
    }
}

/// One point mass per ensemble member, each with its own parameters.
pub struct PointMassEnsemble {
    members: Vec<PointMassParams>,
    dt: f32,
}

impl PointMassEnsemble {
    pub fn new(members: Vec<PointMassParams>) -> Self {
        Self { members, dt: DT }
    }

    pub fn from_env_params(param_sets: &[EnvParams]) -> Result<Self> {
        let members = param_sets
            .iter()
            .map(PointMassParams::from_env_params)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(members))
    }

    pub fn members(&self) -> &[PointMassParams] {
        &self.members
    }
}

impl DynamicsModel for PointMassEnsemble {
    fn num_models(&self) -> usize {
        self.members.len()
    }

    fn predict(&self, obs: &Tensor, action: &Tensor, pred_type: PredictionType) -> Result<Tensor> {
        let obs_rows = obs.to_dtype(DType::F32)?.to_vec2::<f32>()?;
        let act_rows = action.to_dtype(DType::F32)?.to_vec2::<f32>()?;
        ensure!(
            obs_rows.len() == act_rows.len(),
            "got {} observations but {} actions",
            obs_rows.len(),
            act_rows.len()
        );
        let k = self.members.len();
        // laid out as [batch, obs_dim, member]
        let mut data = vec![0f32; obs_rows.len() * 2 * k];
        for (row, (o, a)) in obs_rows.iter().zip(&act_rows).enumerate() {
            let (&[position, velocity], Some(&force)) = (o.as_slice(), a.first()) else {
                bail!("point mass rows must be [position, velocity] with a force");
            };
            for (m, member) in self.members.iter().enumerate() {
                let next = member.integrate(position, velocity, force, self.dt);
                for (d, value) in next.into_iter().enumerate() {
                    data[(row * 2 + d) * k + m] = value;
                }
            }
        }
        let all = Tensor::from_vec(data, (obs_rows.len(), 2, k), obs.device())?;
        Ok(match pred_type {
            PredictionType::All => all,
            PredictionType::Mean => all.mean(2)?,
        })
    }
}
