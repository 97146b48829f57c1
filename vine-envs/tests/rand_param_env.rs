use anyhow::Result;
use candle_core::{Device, Tensor};
use vine_core::{ModelVecEnvConfig, env::Env};
use vine_envs::{PointMassEnsemble, PointMassEnv, RandParamEnv, RandParamsConfig};

fn rand_env(seed: Option<u64>) -> Result<RandParamEnv<PointMassEnv>> {
    RandParamEnv::new(
        PointMassEnv::new(seed),
        RandParamsConfig {
            random_seed: seed,
            ..Default::default()
        },
    )
}

#[test]
fn same_seed_same_params() -> Result<()> {
    let mut a = rand_env(Some(11))?;
    let mut b = rand_env(Some(11))?;
    assert_eq!(a.env_params()?, b.env_params()?);
    a.reset()?;
    b.reset()?;
    assert_eq!(a.env_params()?, b.env_params()?);
    assert_eq!(a.sample_env_params(3), b.sample_env_params(3));
    Ok(())
}

#[test]
fn construction_applies_sampled_params() -> Result<()> {
    let env = rand_env(Some(5))?;
    assert_ne!(&env.env_params()?, env.init_params());
    Ok(())
}

#[test]
fn fixed_params_survive_reset() -> Result<()> {
    let mut env = rand_env(Some(2))?;
    env.fix_params();
    assert!(env.params_fixed());
    let before = env.env_params()?;
    for _ in 0..3 {
        env.reset()?;
        assert_eq!(env.env_params()?, before);
    }
    env.unfix_params();
    env.reset()?;
    assert_ne!(env.env_params()?, before);
    Ok(())
}

#[test]
fn sampling_sets_does_not_touch_the_simulator() -> Result<()> {
    let mut env = rand_env(Some(8))?;
    let before = env.env_params()?;
    let sets = env.sample_env_params(4);
    assert_eq!(sets.len(), 4);
    assert_eq!(env.env_params()?, before);
    env.set_env_params(&sets[1])?;
    assert_eq!(env.env_params()?, sets[1]);
    Ok(())
}

#[test]
fn model_rollout_over_randomized_env() -> Result<()> {
    let mut env = rand_env(Some(4))?;
    let param_sets = env.sample_env_params(2);
    let ensemble = PointMassEnsemble::from_env_params(&param_sets)?;
    assert_eq!(ensemble.members().len(), 2);
    assert_eq!(
        ensemble.members()[1].mass,
        param_sets[1][&vine_envs::SimParam::BodyMass][0]
    );
    let mut vec_env = ModelVecEnvConfig::default()
        .with_n_parallel(4)
        .with_max_path_length(3)
        .build(env, ensemble)?;
    vec_env.reset()?;
    let actions = Tensor::new(&[[1f32], [1.], [-1.], [0.]], &Device::Cpu)?;
    for _ in 0..2 {
        let step = vec_env.step(&actions)?;
        assert_eq!(step.dones, vec![false; 4]);
        assert_eq!(step.rewards.len(), 4);
    }
    let step = vec_env.step(&actions)?;
    assert_eq!(step.dones, vec![true; 4]);
    let init_obs = vec_env.batch_state().unwrap().init_obs.to_vec2::<f32>()?;
    for (slot, obs) in step.observations.iter().enumerate() {
        assert_eq!(obs.to_vec1::<f32>()?, init_obs[slot]);
    }
    vec_env.terminate();
    Ok(())
}
