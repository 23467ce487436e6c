use crate::error::{DepthResult, NumericError};
use ndarray::Array2;

/// Scale applied to depth in metric mode. Stereo-supervised weights learn depth
/// relative to a 0.1 baseline, the KITTI rig baseline is 0.54 m.
pub const STEREO_SCALE_FACTOR: f32 = 5.4;

/// Validated `0 < min_depth < max_depth` pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthBounds {
	min_depth: f32,
	max_depth: f32,
}

impl DepthBounds {
	pub fn new(min_depth: f32, max_depth: f32) -> Result<Self, NumericError> {
		// Written so NaN fails too.
		if !(min_depth > 0.0 && max_depth > min_depth && max_depth.is_finite()) {
			return Err(NumericError::InvalidDepthBounds { min_depth, max_depth });
		}
		Ok(Self { min_depth, max_depth })
	}

	pub fn min_depth(&self) -> f32 {
		self.min_depth
	}

	pub fn max_depth(&self) -> f32 {
		self.max_depth
	}

	pub fn min_disp(&self) -> f32 {
		1.0 / self.max_depth
	}

	pub fn max_disp(&self) -> f32 {
		1.0 / self.min_depth
	}

	pub fn scale_disparity(&self, disp: f32) -> f32 {
		let min_disp = self.min_disp();
		let max_disp = self.max_disp();
		min_disp + (max_disp - min_disp) * disp
	}

	/// Returns `(scaled_disparity, depth)`.
	pub fn convert(&self, disparity: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
		let scaled = disparity.mapv(|d| self.scale_disparity(d));
		let depth = scaled.mapv(|s| 1.0 / s);
		(scaled, depth)
	}
}

/// Converts a sigmoid disparity map into inverse-depth units and depth.
pub fn disp_to_depth(
	disparity: &Array2<f32>,
	min_depth: f32,
	max_depth: f32,
) -> DepthResult<(Array2<f32>, Array2<f32>)> {
	let bounds = DepthBounds::new(min_depth, max_depth)?;
	Ok(bounds.convert(disparity))
}

/// Applies the stereo baseline scale. Only meaningful for stereo-trained weights.
pub fn to_metric_depth(depth: &Array2<f32>) -> Array2<f32> {
	depth.mapv(|d| d * STEREO_SCALE_FACTOR)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::DepthError;
	use approx::assert_relative_eq;
	use ndarray::array;

	#[test]
	fn matches_closed_form() {
		let disp = array![[0.0f32, 0.25], [0.5, 1.0]];
		let (scaled, depth) = disp_to_depth(&disp, 0.1, 100.0).unwrap();

		let min_disp = 1.0f32 / 100.0;
		let max_disp = 1.0f32 / 0.1;
		for (d, (s, z)) in disp.iter().zip(scaled.iter().zip(depth.iter())) {
			let expected = min_disp + (max_disp - min_disp) * d;
			assert_eq!(*s, expected);
			assert_eq!(*z, 1.0 / expected);
		}
		assert_relative_eq!(depth[[0, 0]], 100.0, max_relative = 1e-5);
		assert_relative_eq!(depth[[1, 1]], 0.1, max_relative = 1e-5);
	}

	#[test]
	fn depth_strictly_decreasing_and_positive() {
		let bounds = DepthBounds::new(0.1, 100.0).unwrap();
		let disp = Array2::from_shape_fn((1, 101), |(_, i)| i as f32 / 100.0);
		let (scaled, depth) = bounds.convert(&disp);

		assert!(scaled.iter().all(|&s| s > 0.0));
		assert!(depth.iter().all(|&z| z > 0.0));
		for pair in depth.row(0).to_vec().windows(2) {
			assert!(pair[1] < pair[0], "{} !< {}", pair[1], pair[0]);
		}
	}

	#[test]
	fn rejects_invalid_bounds() {
		let disp = Array2::<f32>::zeros((2, 2));
		for (min, max) in [(0.0, 100.0), (-1.0, 5.0), (5.0, 5.0), (10.0, 1.0), (f32::NAN, 1.0)] {
			let err = disp_to_depth(&disp, min, max).unwrap_err();
			assert!(matches!(
				err,
				DepthError::Numeric(NumericError::InvalidDepthBounds { .. })
			));
		}
	}

	#[test]
	fn metric_scaling() {
		let depth = array![[1.0f32, 2.0]];
		assert_eq!(to_metric_depth(&depth), array![[5.4f32, 10.8]]);
	}
}
