pub mod env;
pub mod error;
pub mod executor;
pub mod infos;
pub mod model;
pub mod rng;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::ExecutorError;
pub use executor::{ModelStep, ModelVecEnv, ModelVecEnvConfig};
