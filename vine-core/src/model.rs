use anyhow::Result;
use candle_core::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionType {
    /// Average over the ensemble, shaped `[batch, obs_dim]`.
    Mean,
    /// Every member's prediction, shaped `[batch, obs_dim, num_models]`.
    All,
}

/// A learned ensemble of dynamics models.
pub trait DynamicsModel {
    fn num_models(&self) -> usize;

    fn predict(&self, obs: &Tensor, action: &Tensor, pred_type: PredictionType) -> Result<Tensor>;
}
