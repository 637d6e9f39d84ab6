use candle_core::{DType, Device, Tensor};

use logvec_core::error::{Error, Result};

use crate::provider::model_err;

/// Mean over the position axis of a `[B, N, D]` tensor, giving `[B, D]`.
///
/// Every position counts, padding included: no attention mask is applied.
pub fn mean_pool(hidden: &Tensor) -> Result<Tensor> {
    let (batch, _seq, dim) = hidden.dims3().map_err(model_err)?;
    let pooled = hidden.mean(1).map_err(model_err)?;
    if pooled.dims() != [batch, dim] {
        return Err(Error::InvalidConfig(format!("pooled shape {:?} != [{batch}, {dim}]", pooled.dims())));
    }
    Ok(pooled)
}

/// Pool a `[B, N, D]` tensor and copy the rows to host memory.
pub fn pool_rows(hidden: &Tensor) -> Result<Vec<Vec<f32>>> {
    let pooled = mean_pool(hidden)?;
    pooled
        .to_device(&Device::Cpu)
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_vec2())
        .map_err(model_err)
}
