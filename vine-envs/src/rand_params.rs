//! Domain randomization over simulator parameters.
//!
//! [`RandParamEnv`] decorates a [`ParametrizedSim`] and rescales each of its randomizable
//! parameters by `2^u`, with `u ~ Uniform[-log_scale_limit, log_scale_limit]` drawn
//! independently per element. Factors always apply to the values the simulator had when it was
//! wrapped.

use anyhow::{Result, ensure};
use candle_core::Tensor;
use derive_more::Display;
use rand::{Rng, rngs::StdRng};
use std::collections::BTreeMap;
use tracing::debug;
use vine_core::{
    env::{Env, EnvironmentDescription, SnapShot},
    rng::rng_from_seed,
};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SimParam {
    #[display("body_mass")]
    BodyMass,
    #[display("body_inertia")]
    BodyInertia,
    #[display("dof_damping")]
    DofDamping,
    #[display("geom_friction")]
    GeomFriction,
}

impl SimParam {
    pub const ALL: [SimParam; 4] = [
        SimParam::BodyMass,
        SimParam::BodyInertia,
        SimParam::DofDamping,
        SimParam::GeomFriction,
    ];
}

/// Keeps every factor `2^u` finite.
pub const MAX_LOG_SCALE_LIMIT: f64 = 64.;

/// Absolute parameter values keyed by parameter.
pub type EnvParams = BTreeMap<SimParam, Vec<f64>>;

/// A physics backed environment whose dynamics parameters can be read and overwritten.
pub trait ParametrizedSim: Env {
    /// The subset of [`SimParam::ALL`] this simulator supports.
    fn randomizable_params(&self) -> Vec<SimParam>;
    fn sim_param(&self, param: SimParam) -> Result<Vec<f64>>;
    fn set_sim_param(&mut self, param: SimParam, values: &[f64]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandParamsConfig {
    pub log_scale_limit: f64,
    /// Makes sampling reproducible for this instance. `None` draws from the OS.
    pub random_seed: Option<u64>,
}

impl Default for RandParamsConfig {
    fn default() -> Self {
        Self {
            log_scale_limit: 2.0,
            random_seed: None,
        }
    }
}

pub struct RandParamEnv<E: ParametrizedSim> {
    env: E,
    log_scale_limit: f64,
    rng: StdRng,
    init_params: EnvParams,
    fixed_params: bool,
}

impl<E: ParametrizedSim> RandParamEnv<E> {
    pub fn new(env: E, config: RandParamsConfig) -> Result<Self> {
        let RandParamsConfig {
            log_scale_limit,
            random_seed,
        } = config;
        ensure!(
            (0. ..=MAX_LOG_SCALE_LIMIT).contains(&log_scale_limit),
            "log_scale_limit must be within [0, {MAX_LOG_SCALE_LIMIT}], got {log_scale_limit}"
        );
        let init_params = env
            .randomizable_params()
            .into_iter()
            .map(|param| -> Result<(SimParam, Vec<f64>)> {
                Ok((param, env.sim_param(param)?))
            })
            .collect::<Result<EnvParams>>()?;
        let mut rand_env = Self {
            env,
            log_scale_limit,
            rng: rng_from_seed(random_seed),
            init_params,
            fixed_params: false,
        };
        rand_env.resample_params()?;
        Ok(rand_env)
    }

    fn sample_params(&mut self) -> EnvParams {
        let limit = self.log_scale_limit;
        let rng = &mut self.rng;
        self.init_params
            .iter()
            .map(|(param, init)| {
                let values = init
                    .iter()
                    .map(|v| v * 2f64.powf(rng.random_range(-limit..=limit)))
                    .collect();
                (*param, values)
            })
            .collect()
    }

    fn resample_params(&mut self) -> Result<()> {
        let params = self.sample_params();
        self.set_env_params(&params)?;
        debug!(?params, "sampled env params");
        Ok(())
    }

    /// Draws `n` parameter sets without applying any of them.
    pub fn sample_env_params(&mut self, n: usize) -> Vec<EnvParams> {
        (0..n).map(|_| self.sample_params()).collect()
    }

    /// Applies every parameter in `params` or none of them.
    pub fn set_env_params(&mut self, params: &EnvParams) -> Result<()> {
        for (param, values) in params {
            ensure!(
                self.init_params.contains_key(param),
                "{param} is not randomizable for this simulator"
            );
            ensure!(
                values.iter().all(|v| v.is_finite()),
                "{param} has non finite values {values:?}"
            );
        }
        let previous = self.env_params()?;
        for (param, values) in params {
            if let Err(err) = self.env.set_sim_param(*param, values) {
                for (param, values) in &previous {
                    self.env.set_sim_param(*param, values)?;
                }
                return Err(err.context(format!("failed to set {param}")));
            }
        }
        Ok(())
    }

    /// The parameters currently set on the simulator.
    pub fn env_params(&self) -> Result<EnvParams> {
        self.init_params
            .keys()
            .map(|param| -> Result<(SimParam, Vec<f64>)> {
                Ok((*param, self.env.sim_param(*param)?))
            })
            .collect()
    }

    pub fn init_params(&self) -> &EnvParams {
        &self.init_params
    }

    /// Keeps the current parameters across resets.
    pub fn fix_params(&mut self) {
        self.fixed_params = true;
        debug!("fixed env params");
    }

    pub fn unfix_params(&mut self) {
        self.fixed_params = false;
        debug!("unfixed env params");
    }

    pub fn params_fixed(&self) -> bool {
        self.fixed_params
    }

    pub fn inner(&self) -> &E {
        &self.env
    }
}

impl<E: ParametrizedSim> Env for RandParamEnv<E> {
    fn reset(&mut self) -> Result<Tensor> {
        if !self.fixed_params {
            self.resample_params()?;
        }
        self.env.reset()
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot<Tensor>> {
        self.env.step(action)
    }

    fn env_description(&self) -> EnvironmentDescription<Tensor> {
        self.env.env_description()
    }

    fn wrapped_env(&self) -> Option<&dyn Env> {
        Some(&self.env)
    }
}
