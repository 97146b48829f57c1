use crate::error::{ExecutorError, Result};
use candle_core::Tensor;
use derive_more::Deref;
use std::collections::BTreeMap;

/// Auxiliary per-slot step information keyed by name.
pub type EnvInfo = BTreeMap<String, Tensor>;

/// Per-slot infos stacked key-wise, each field has the slot count as its leading dim.
#[derive(Deref, Debug, Clone)]
pub struct StackedEnvInfos {
    len: usize,
    #[deref]
    fields: BTreeMap<String, Tensor>,
}

impl StackedEnvInfos {
    /// Number of slots that were stacked, even when there are no fields.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub fn stack_env_infos(infos: &[EnvInfo]) -> Result<StackedEnvInfos> {
    let mut fields = BTreeMap::new();
    let Some(first) = infos.first() else {
        return Ok(StackedEnvInfos { len: 0, fields });
    };
    for (slot, info) in infos.iter().enumerate() {
        if info.len() != first.len() || !info.keys().all(|k| first.contains_key(k)) {
            return Err(ExecutorError::InfoKeyMismatch { slot });
        }
    }
    for key in first.keys() {
        let column = infos.iter().map(|info| &info[key]).collect::<Vec<_>>();
        fields.insert(key.clone(), Tensor::stack(&column, 0)?);
    }
    Ok(StackedEnvInfos {
        len: infos.len(),
        fields,
    })
}
