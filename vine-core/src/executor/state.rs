use crate::error::{ExecutorError, Result};
use candle_core::{DType, Tensor};

/// Slot state owned by the executor between `reset` and `step` calls.
#[derive(Debug, Clone)]
pub struct BatchState {
    pub current_obs: Tensor,
    pub timesteps: Vec<usize>,
    pub init_obs: Tensor,
}

/// The result of a step, computed against a `BatchState` but not yet applied.
#[derive(Debug)]
pub struct PendingStep {
    pub next_obs: Tensor,
    pub timesteps: Vec<usize>,
    pub dones: Vec<bool>,
}

impl BatchState {
    pub fn from_reset(observations: &[Tensor]) -> Result<Self> {
        let current_obs = Tensor::stack(observations, 0)?;
        let rank = current_obs.rank();
        if rank != 2 {
            return Err(ExecutorError::ObservationRank { rank });
        }
        Ok(Self {
            init_obs: current_obs.clone(),
            timesteps: vec![0; observations.len()],
            current_obs,
        })
    }

    pub fn n_slots(&self) -> usize {
        self.timesteps.len()
    }

    /// Advances every counter, forces `done` once a slot reaches the horizon and swaps finished
    /// slots back to their initial observation.
    pub fn prepare(
        &self,
        predicted_obs: &Tensor,
        mut dones: Vec<bool>,
        max_path_length: Option<usize>,
    ) -> Result<PendingStep> {
        let mut timesteps: Vec<usize> = self.timesteps.iter().map(|t| t + 1).collect();
        if let Some(horizon) = max_path_length {
            for (done, t) in dones.iter_mut().zip(&timesteps) {
                if *t >= horizon {
                    *done = true;
                }
            }
        }
        for (t, _) in timesteps.iter_mut().zip(&dones).filter(|(_, done)| **done) {
            *t = 0;
        }
        let next_obs = if dones.iter().any(|d| *d) {
            let mask = dones.iter().map(|d| *d as u8).collect::<Vec<_>>();
            Tensor::from_vec(mask, (dones.len(), 1), predicted_obs.device())?
                .broadcast_as(predicted_obs.shape())?
                .where_cond(&self.init_obs.to_dtype(predicted_obs.dtype())?, predicted_obs)?
        } else {
            predicted_obs.clone()
        };
        Ok(PendingStep {
            next_obs,
            timesteps,
            dones,
        })
    }

    pub fn apply(&mut self, pending: &PendingStep) {
        self.current_obs = pending.next_obs.clone();
        self.timesteps.clone_from(&pending.timesteps);
    }
}

pub(crate) fn as_f32_vec(t: &Tensor) -> Result<Vec<f32>> {
    Ok(t.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
}

#[cfg(test)]
mod test {
    use super::BatchState;
    use candle_core::{Device, Tensor};

    fn rows(values: &[[f32; 2]]) -> candle_core::Result<Vec<Tensor>> {
        values.iter().map(|row| Tensor::new(row, &Device::Cpu)).collect()
    }

    #[test]
    fn horizon_forces_done_and_resets_counter() -> anyhow::Result<()> {
        let mut state = BatchState::from_reset(&rows(&[[0., 0.], [1., 1.]])?)?;
        state.timesteps = vec![1, 0];
        let predicted = Tensor::new(&[[5f32, 5.], [6., 6.]], &Device::Cpu)?;
        let pending = state.prepare(&predicted, vec![false, false], Some(2))?;
        assert_eq!(pending.dones, vec![true, false]);
        assert_eq!(pending.timesteps, vec![0, 1]);
        assert_eq!(
            pending.next_obs.to_vec2::<f32>()?,
            vec![vec![0., 0.], vec![6., 6.]]
        );
        state.apply(&pending);
        assert_eq!(state.timesteps, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn no_done_keeps_prediction() -> anyhow::Result<()> {
        let state = BatchState::from_reset(&rows(&[[0., 0.], [1., 1.]])?)?;
        let predicted = Tensor::new(&[[5f32, 5.], [6., 6.]], &Device::Cpu)?;
        let pending = state.prepare(&predicted, vec![false, false], None)?;
        assert_eq!(pending.next_obs.to_vec2::<f32>()?, predicted.to_vec2::<f32>()?);
        assert_eq!(pending.timesteps, vec![1, 1]);
        Ok(())
    }

    #[test]
    fn non_flat_observations_are_rejected() -> anyhow::Result<()> {
        let obs = vec![Tensor::zeros((2, 2), candle_core::DType::F32, &Device::Cpu)?; 3];
        assert!(BatchState::from_reset(&obs).is_err());
        Ok(())
    }
}
