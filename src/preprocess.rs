use crate::error::{DepthError, DepthResult};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{Array2, Array4};

/// Network input: `(1, 3, feed_height, feed_width)`, RGB, values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct InputTensor(Array4<f32>);

impl InputTensor {
	pub fn feed_height(&self) -> usize {
		self.0.shape()[2]
	}

	pub fn feed_width(&self) -> usize {
		self.0.shape()[3]
	}

	pub fn as_array(&self) -> &Array4<f32> {
		&self.0
	}
}

/// Resizes to the feed geometry with Lanczos3 and lays the pixels out NCHW.
pub fn prepare(image: &RgbImage, feed_height: u32, feed_width: u32) -> DepthResult<InputTensor> {
	if feed_height == 0 || feed_width == 0 {
		return Err(DepthError::Configuration(format!(
			"Invalid feed resolution {}x{}",
			feed_width, feed_height
		)));
	}
	if image.width() == 0 || image.height() == 0 {
		return Err(DepthError::Input("Image has no pixels".to_string()));
	}

	let resized = image::imageops::resize(image, feed_width, feed_height, FilterType::Lanczos3);

	let (h, w) = (feed_height as usize, feed_width as usize);
	let tensor = Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
		resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
	});

	Ok(InputTensor(tensor))
}

/// Bilinear resize of a disparity map to `(height, width)`.
///
/// Sample positions use half-pixel centres (`align_corners = false`): output
/// pixel `d` reads source coordinate `(d + 0.5) * src / dst - 0.5`, clamped at
/// the border. Downsampling point-samples between the two nearest neighbours
/// rather than averaging the footprint.
pub fn resize_disparity(disp: &Array2<f32>, height: u32, width: u32) -> DepthResult<Array2<f32>> {
	let (src_h, src_w) = disp.dim();
	if src_h == 0 || src_w == 0 {
		return Err(DepthError::Inference("Network returned an empty disparity map".to_string()));
	}
	let (dst_h, dst_w) = (height as usize, width as usize);
	if (src_h, src_w) == (dst_h, dst_w) {
		return Ok(disp.clone());
	}

	let rows = sample_positions(src_h, dst_h);
	let cols = sample_positions(src_w, dst_w);

	Ok(Array2::from_shape_fn((dst_h, dst_w), |(y, x)| {
		let (y0, y1, ly) = rows[y];
		let (x0, x1, lx) = cols[x];
		let top = disp[[y0, x0]] * (1.0 - lx) + disp[[y0, x1]] * lx;
		let bottom = disp[[y1, x0]] * (1.0 - lx) + disp[[y1, x1]] * lx;
		top * (1.0 - ly) + bottom * ly
	}))
}

/// Per output index: the two source neighbours and the weight of the second.
fn sample_positions(src: usize, dst: usize) -> Vec<(usize, usize, f32)> {
	let scale = src as f32 / dst as f32;
	(0..dst)
		.map(|d| {
			let real = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
			let i0 = (real.floor() as usize).min(src - 1);
			let i1 = (i0 + 1).min(src - 1);
			(i0, i1, real - i0 as f32)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use image::Rgb;

	#[test]
	fn prepare_shape_and_range() {
		let img = RgbImage::from_fn(7, 5, |x, y| Rgb([(x * 30) as u8, (y * 50) as u8, 255]));
		let tensor = prepare(&img, 2, 4).unwrap();

		assert_eq!(tensor.as_array().shape(), &[1, 3, 2, 4]);
		assert!(tensor.as_array().iter().all(|&v| (0.0..=1.0).contains(&v)));
		// Blue channel is constant at 255
		for &v in tensor.as_array().slice(ndarray::s![0, 2, .., ..]).iter() {
			assert_abs_diff_eq!(v, 1.0, epsilon = 1e-6);
		}
	}

	#[test]
	fn prepare_keeps_channel_order() {
		let img = RgbImage::from_pixel(3, 3, Rgb([255, 0, 51]));
		let tensor = prepare(&img, 3, 3).unwrap();
		let arr = tensor.as_array();
		assert_abs_diff_eq!(arr[[0, 0, 1, 1]], 1.0, epsilon = 1e-6);
		assert_abs_diff_eq!(arr[[0, 1, 1, 1]], 0.0, epsilon = 1e-6);
		assert_abs_diff_eq!(arr[[0, 2, 1, 1]], 0.2, epsilon = 1e-6);
	}

	#[test]
	fn prepare_rejects_zero_feed() {
		let img = RgbImage::new(4, 4);
		assert!(prepare(&img, 0, 4).is_err());
	}

	#[test]
	fn resize_matches_requested_shape() {
		let disp = Array2::from_shape_fn((2, 3), |(y, x)| (y * 3 + x) as f32 / 6.0);
		for (h, w) in [(1, 1), (4, 4), (7, 13), (2, 3), (480, 640), (3, 1)] {
			let out = resize_disparity(&disp, h, w).unwrap();
			assert_eq!(out.dim(), (h as usize, w as usize));
		}
	}

	#[test]
	fn resize_downsample_point_samples() {
		let disp = ndarray::array![[0.0f32, 0.0, 1.0, 1.0]];
		let out = resize_disparity(&disp, 1, 2).unwrap();
		assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-6);
		assert_abs_diff_eq!(out[[0, 1]], 1.0, epsilon = 1e-6);
	}

	#[test]
	fn resize_upsample_uses_half_pixel_centres() {
		let disp = ndarray::array![[0.0f32, 3.0]];
		let out = resize_disparity(&disp, 1, 4).unwrap();
		let expected = [0.0f32, 0.75, 2.25, 3.0];
		for (v, e) in out.iter().zip(expected) {
			assert_abs_diff_eq!(*v, e, epsilon = 1e-6);
		}

		let column = ndarray::array![[0.0f32], [3.0]];
		let out = resize_disparity(&column, 4, 2).unwrap();
		assert_abs_diff_eq!(out[[1, 0]], 0.75, epsilon = 1e-6);
		assert_abs_diff_eq!(out[[2, 1]], 2.25, epsilon = 1e-6);
	}

	#[test]
	fn resize_keeps_values_outside_unit_range() {
		let disp = ndarray::array![[-1.0f32, 2.0]];
		let out = resize_disparity(&disp, 1, 4).unwrap();
		assert_abs_diff_eq!(out[[0, 0]], -1.0, epsilon = 1e-6);
		assert_abs_diff_eq!(out[[0, 3]], 2.0, epsilon = 1e-6);
	}

	#[test]
	fn resize_constant_stays_constant() {
		let disp = Array2::from_elem((2, 2), 0.375f32);
		let out = resize_disparity(&disp, 5, 9).unwrap();
		for &v in out.iter() {
			assert_abs_diff_eq!(v, 0.375, epsilon = 1e-6);
		}
	}
}
