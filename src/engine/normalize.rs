use ndarray::{Array2, Axis};

/// Rescales every column independently into `[0, 1]`
///
/// `scaled = (v - min) / (max - min)`. A constant column (including an
/// all-zero one) has no range to scale over and becomes all zeros.
pub fn min_max_scale_columns(values: &Array2<f64>) -> Array2<f64> {
    let mut scaled = values.clone();
    let mut constant_columns = 0usize;

    for mut column in scaled.axis_iter_mut(Axis(1)) {
        let min = column.iter().copied().fold(f64::INFINITY, f64::min);
        let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        if range > 0.0 && range.is_finite() {
            column.mapv_inplace(|v| (v - min) / range);
        } else {
            constant_columns += 1;
            column.fill(0.0);
        }
    }

    if constant_columns > 0 {
        tracing::debug!(
            columns = constant_columns,
            "Constant columns scaled to zero"
        );
    }

    scaled
}
