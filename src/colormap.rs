use image::{Rgb, RgbImage};
use ndarray::Array2;

/// Upper percentile used as the normalization ceiling.
pub const VMAX_PERCENTILE: f32 = 95.0;

const PALETTE_SIZE: usize = 256;

// Magma, sampled at 0.0, 0.1, ..., 1.0.
const MAGMA_STOPS: [[u8; 3]; 11] = [
	[0x00, 0x00, 0x04],
	[0x14, 0x0e, 0x36],
	[0x3b, 0x0f, 0x70],
	[0x64, 0x1a, 0x80],
	[0x8c, 0x29, 0x81],
	[0xb7, 0x37, 0x79],
	[0xde, 0x49, 0x68],
	[0xf7, 0x70, 0x5c],
	[0xfe, 0x9f, 0x6d],
	[0xfe, 0xcf, 0x92],
	[0xfc, 0xfd, 0xbf],
];

/// Color of palette entry `index` out of 256.
fn palette_entry(index: usize) -> Rgb<u8> {
	let t = index.min(PALETTE_SIZE - 1) as f32 / (PALETTE_SIZE - 1) as f32;
	let pos = t * (MAGMA_STOPS.len() - 1) as f32;
	let lo = (pos.floor() as usize).min(MAGMA_STOPS.len() - 2);
	let frac = pos - lo as f32;

	let a = MAGMA_STOPS[lo];
	let b = MAGMA_STOPS[lo + 1];
	let mut out = [0u8; 3];
	for c in 0..3 {
		let v = a[c] as f32 + (b[c] as f32 - a[c] as f32) * frac;
		out[c] = v.round().clamp(0.0, 255.0) as u8;
	}
	Rgb(out)
}

/// Looks up a normalized value. Out-of-range values clamp to the ends of the ramp.
pub fn magma(t: f32) -> Rgb<u8> {
	let t = if t.is_nan() { 0.0 } else { t };
	let index = (t * PALETTE_SIZE as f32).floor();
	palette_entry(index.clamp(0.0, (PALETTE_SIZE - 1) as f32) as usize)
}

/// Linear-interpolated percentile, `p` in `[0, 100]`. `None` for an empty map.
pub fn percentile(values: &Array2<f32>, p: f32) -> Option<f32> {
	let mut sorted: Vec<f32> = values.iter().copied().collect();
	if sorted.is_empty() {
		return None;
	}
	sorted.sort_by(|a, b| a.total_cmp(b));

	let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
	let lo = rank.floor() as usize;
	let hi = (rank.ceil() as usize).min(sorted.len() - 1);
	let frac = rank - lo as f32;
	Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Colorizes a disparity map. The floor is the minimum, the ceiling the 95th
/// percentile, values above it saturate. A constant map gives a flat image in
/// the bottom color of the ramp.
pub fn colorize(disp: &Array2<f32>) -> RgbImage {
	let (height, width) = disp.dim();
	let vmax = match percentile(disp, VMAX_PERCENTILE) {
		Some(v) => v,
		None => return RgbImage::new(width as u32, height as u32),
	};
	let vmin = disp.iter().copied().fold(f32::INFINITY, f32::min);
	let range = vmax - vmin;

	RgbImage::from_fn(width as u32, height as u32, |x, y| {
		let v = disp[[y as usize, x as usize]];
		let t = if range > 0.0 { (v - vmin) / range } else { 0.0 };
		magma(t)
	})
}
