use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("n_parallel must be at least 1")]
    ZeroSlots,

    #[error("the dynamics model reports zero ensemble members")]
    ZeroModels,

    #[error("n_parallel ({n_parallel}) is not divisible by num_models ({num_models})")]
    IndivisibleShards {
        n_parallel: usize,
        num_models: usize,
    },

    #[error("max_path_length must be at least 1 when set")]
    ZeroHorizon,

    #[error("the innermost environment does not provide a reward function")]
    MissingRewardFn,

    #[error("step called before reset")]
    NotReset,

    #[error("action batch has {got} rows, expected {expected}")]
    ActionBatchMismatch { expected: usize, got: usize },

    #[error("stacked reset observations have rank {rank}, expected 2")]
    ObservationRank { rank: usize },

    #[error("{what} has {got} entries, expected {expected}")]
    BatchLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("env info for slot {slot} does not have the same keys as slot 0")]
    InfoKeyMismatch { slot: usize },

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
