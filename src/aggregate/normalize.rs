//! Numeric rescaling applied before weighting

use crate::node::NormalizationMethod;

/// Rescale `values` in place
///
/// A degenerate input set (zero range for min-max, all zeros for max-abs)
/// maps every value to 1.0: the inputs agree, so they are treated as fully
/// normalized.
pub fn normalize(values: &mut [f64], method: NormalizationMethod) {
    if values.is_empty() {
        return;
    }

    match method {
        NormalizationMethod::MinMax => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range == 0.0 {
                values.fill(1.0);
            } else {
                for v in values.iter_mut() {
                    *v = (*v - min) / range;
                }
            }
        }
        NormalizationMethod::MaxAbs => {
            let max_abs = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            if max_abs == 0.0 {
                values.fill(1.0);
            } else {
                for v in values.iter_mut() {
                    *v /= max_abs;
                }
            }
        }
    }
}
