use burn::tensor::backend::Backend;
use burn::tensor::{Data, Shape, Tensor};
use num_traits::ToPrimitive;

use crate::error::{Result, SchedulerError};

/// Copies a 1-D float tensor into host memory as `f64`.
pub(crate) fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .value
        .iter()
        .enumerate()
        .map(|(index, value)| {
            value
                .to_f64()
                .ok_or(SchedulerError::ElementConversion { index })
        })
        .collect()
}

pub(crate) fn vec_to_tensor<B: Backend>(values: Vec<f64>, device: &B::Device) -> Tensor<B, 1> {
    let dims = [values.len()];
    let data = Data::new(values, Shape::new(dims)).convert::<B::FloatElem>();

    Tensor::from_data(data, device)
}
