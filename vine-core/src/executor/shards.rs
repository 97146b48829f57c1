use crate::error::{ExecutorError, Result};
use std::ops::Range;

/// A contiguous block of slots stepped by a single ensemble member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub model_idx: usize,
    pub slots: Range<usize>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Partition of `n_parallel` slots into `num_models` equal contiguous groups.
/// Slot `i` belongs to model `i / (n_parallel / num_models)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardPlan {
    n_parallel: usize,
    num_models: usize,
    shard_size: usize,
}

impl ShardPlan {
    pub fn new(n_parallel: usize, num_models: usize) -> Result<Self> {
        if n_parallel == 0 {
            return Err(ExecutorError::ZeroSlots);
        }
        if num_models == 0 {
            return Err(ExecutorError::ZeroModels);
        }
        if n_parallel % num_models != 0 {
            return Err(ExecutorError::IndivisibleShards {
                n_parallel,
                num_models,
            });
        }
        Ok(Self {
            n_parallel,
            num_models,
            shard_size: n_parallel / num_models,
        })
    }

    pub fn n_parallel(&self) -> usize {
        self.n_parallel
    }

    pub fn num_models(&self) -> usize {
        self.num_models
    }

    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    pub fn model_for_slot(&self, slot: usize) -> Option<usize> {
        (slot < self.n_parallel).then(|| slot / self.shard_size)
    }

    pub fn shard(&self, model_idx: usize) -> Option<Shard> {
        (model_idx < self.num_models).then(|| {
            let start = model_idx * self.shard_size;
            Shard {
                model_idx,
                slots: start..start + self.shard_size,
            }
        })
    }

    pub fn shards(&self) -> impl Iterator<Item = Shard> + '_ {
        (0..self.num_models).filter_map(|model_idx| self.shard(model_idx))
    }
}

#[cfg(test)]
mod test {
    use super::{Shard, ShardPlan};
    use crate::error::ExecutorError;

    #[test]
    fn slots_map_to_contiguous_models() -> anyhow::Result<()> {
        let plan = ShardPlan::new(6, 3)?;
        assert_eq!(plan.shard_size(), 2);
        let owners: Vec<_> = (0..6).filter_map(|slot| plan.model_for_slot(slot)).collect();
        assert_eq!(owners, vec![0, 0, 1, 1, 2, 2]);
        assert_eq!(plan.model_for_slot(6), None);
        Ok(())
    }

    #[test]
    fn shards_cover_every_slot_once() -> anyhow::Result<()> {
        let plan = ShardPlan::new(8, 4)?;
        let shards: Vec<Shard> = plan.shards().collect();
        assert_eq!(shards.len(), 4);
        assert_eq!(shards[3].slots, 6..8);
        assert!(shards.iter().all(|s| s.len() == 2 && !s.is_empty()));
        let covered: Vec<usize> = shards.iter().flat_map(|s| s.slots.clone()).collect();
        assert_eq!(covered, (0..8).collect::<Vec<_>>());
        for shard in &shards {
            for slot in shard.slots.clone() {
                assert_eq!(plan.model_for_slot(slot), Some(shard.model_idx));
            }
        }
        Ok(())
    }

    #[test]
    fn single_model_owns_everything() -> anyhow::Result<()> {
        let plan = ShardPlan::new(5, 1)?;
        assert_eq!(plan.shard(0).map(|s| s.slots), Some(0..5));
        assert!(plan.shard(1).is_none());
        Ok(())
    }

    #[test]
    fn uneven_partition_is_a_config_error() {
        let err = ShardPlan::new(5, 2).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::IndivisibleShards {
                n_parallel: 5,
                num_models: 2
            }
        ));
        assert!(matches!(ShardPlan::new(0, 2), Err(ExecutorError::ZeroSlots)));
        assert!(matches!(ShardPlan::new(4, 0), Err(ExecutorError::ZeroModels)));
    }
}
