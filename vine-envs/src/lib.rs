pub mod point_mass;
pub mod rand_params;

pub use point_mass::{PointMassEnsemble, PointMassEnv, PointMassParams};
pub use rand_params::{EnvParams, ParametrizedSim, RandParamEnv, RandParamsConfig, SimParam};
