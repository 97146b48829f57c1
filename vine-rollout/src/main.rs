// Imagined rollouts of a randomized point mass through a parameter-sampled ensemble.

use anyhow::Result;
use candle_core::{Device, Tensor};
use clap::Parser;
use rand::Rng;
use tracing::{Level, info};
use vine_core::{ModelVecEnvConfig, rng::rng_from_seed};
use vine_envs::{PointMassEnsemble, PointMassEnv, RandParamEnv, RandParamsConfig};

#[derive(Parser, Debug, Clone)]
#[command(about = "Drive batched model rollouts over a randomized point mass")]
struct Args {
    #[arg(long, default_value_t = 8)]
    n_parallel: usize,

    #[arg(long, default_value_t = 4)]
    num_models: usize,

    #[arg(long)]
    max_path_length: Option<usize>,

    #[arg(long, default_value_t = 20)]
    steps: usize,

    #[arg(long, default_value_t = 2.0)]
    log_scale_limit: f64,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let mut env = RandParamEnv::new(
        PointMassEnv::new(args.seed),
        RandParamsConfig {
            log_scale_limit: args.log_scale_limit,
            random_seed: args.seed,
        },
    )?;
    let ensemble = PointMassEnsemble::from_env_params(&env.sample_env_params(args.num_models))?;
    let config = ModelVecEnvConfig {
        n_parallel: args.n_parallel,
        max_path_length: args.max_path_length,
    };
    let mut vec_env = config.build(env, ensemble)?;
    let act_dim = vec_env.action_space().size();
    let mut rng = rng_from_seed(args.seed.map(|seed| seed.wrapping_add(1)));

    vec_env.reset()?;
    let mut returns = vec![0f32; args.n_parallel];
    let mut episodes = 0;
    for t in 0..args.steps {
        let actions: Vec<f32> = (0..args.n_parallel * act_dim)
            .map(|_| rng.random_range(-1f32..=1.))
            .collect();
        let actions = Tensor::from_vec(actions, (args.n_parallel, act_dim), &Device::Cpu)?;
        let step = vec_env.step(&actions)?;
        for (ret, reward) in returns.iter_mut().zip(&step.rewards) {
            *ret += reward;
        }
        let finished = step.dones.iter().filter(|d| **d).count();
        episodes += finished;
        info!(
            t,
            finished,
            mean_reward = step.rewards.iter().sum::<f32>() / args.n_parallel as f32,
            "model step"
        );
    }
    info!(episodes, ?returns, "rollout finished");
    vec_env.terminate();
    Ok(())
}
