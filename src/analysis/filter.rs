use ndarray::{Array1, ArrayView1};
use ndarray_stats::QuantileExt;

/// Lifts raw integer samples into an `f64` array for the statistics below.
pub fn to_f64(data: &[u32]) -> Array1<f64> {
    ArrayView1::from(data).mapv(f64::from)
}

/// Arithmetic mean of `data`, `None` when empty.
pub fn moving_average(data: &[u32]) -> Option<f64> {
    to_f64(data).mean()
}

/// Peak-to-peak amplitude (AC) and mean level (DC) of a window.
pub fn ac_dc(data: &[u32]) -> Option<(f64, f64)> {
    let view = ArrayView1::from(data);
    let max = *view.max().ok()?;
    let min = *view.min().ok()?;
    let dc = moving_average(data)?;
    Some((f64::from(max - min), dc))
}

/// Self-relative detection level: halfway between the window's extremes.
/// `None` for an empty window or one containing NaN.
pub fn midpoint_threshold(data: ArrayView1<f64>) -> Option<f64> {
    let min = *data.min().ok()?;
    let max = *data.max().ok()?;
    Some(min + (max - min) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_window() {
        assert_eq!(moving_average(&[2, 4, 6, 8]), Some(5.0));
        assert_eq!(moving_average(&[]), None);
    }

    #[test]
    fn ac_dc_of_window() {
        let (ac, dc) = ac_dc(&[10, 30, 20]).unwrap();
        assert_eq!(ac, 20.0);
        assert_eq!(dc, 20.0);
        assert!(ac_dc(&[]).is_none());
    }

    #[test]
    fn threshold_sits_between_extremes() {
        let data = [1.0, 5.0, 3.0];
        assert_eq!(midpoint_threshold(ArrayView1::from(&data[..])), Some(3.0));
        assert_eq!(midpoint_threshold(ArrayView1::from(&[] as &[f64])), None);
    }
}
