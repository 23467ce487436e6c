use crate::error::{DepthError, DepthResult};
use image::RgbImage;
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::NpzWriter;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const ARCHIVE_FILE: &str = "pred.npz";
pub const DUMP_STEM: &str = "dis_monodepth2";
/// Key of the stacked predictions inside `pred.npz`.
pub const ARCHIVE_KEY: &str = "pred";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
	Jpeg { quality: u8 },
	#[default]
	Png,
}

impl ImageEncoding {
	pub fn extension(&self) -> &'static str {
		match self {
			ImageEncoding::Jpeg { .. } => "jpg",
			ImageEncoding::Png => "png",
		}
	}
}

/// Run-scoped output directory.
#[derive(Clone, Debug)]
pub struct RunDirectory {
	root: PathBuf,
}

impl RunDirectory {
	/// Creates `<base>/submission_<unix seconds>`.
	pub fn create_timestamped(base: impl AsRef<Path>) -> DepthResult<Self> {
		let stamp = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap_or_default()
			.as_secs();
		Self::create(base.as_ref().join(format!("submission_{}", stamp)))
	}

	pub fn create(root: impl Into<PathBuf>) -> DepthResult<Self> {
		let root = root.into();
		std::fs::create_dir_all(&root).map_err(|e| {
			DepthError::Storage(format!("Failed to create output directory {:?}: {}", root, e))
		})?;
		Ok(Self { root })
	}

	pub fn path(&self) -> &Path {
		&self.root
	}

	/// Visualization path for an input named `name`. The full input name is
	/// kept; the encoding's extension is appended unless the name already ends
	/// with it (`x.jpg` -> `x.jpg.png`, `x.png` -> `x.png`).
	pub fn visualization_path(&self, name: &str, encoding: ImageEncoding) -> PathBuf {
		self.root.join(visualization_name(name, encoding))
	}

	/// `<name>_<suffix>.npy`, keeping the input's extension in `name`.
	pub fn array_path(&self, name: &str, suffix: &str) -> PathBuf {
		self.root.join(format!("{}_{}.npy", name, suffix))
	}
}

fn visualization_name(name: &str, encoding: ImageEncoding) -> String {
	let ext = encoding.extension();
	let has_ext = Path::new(name)
		.extension()
		.and_then(|e| e.to_str())
		.map(|e| e.eq_ignore_ascii_case(ext))
		.unwrap_or(false);
	if has_ext {
		name.to_string()
	} else {
		format!("{}.{}", name, ext)
	}
}

/// Fails when two inputs would write the same output file.
pub fn check_unique_outputs<'a>(
	names: impl IntoIterator<Item = &'a str>,
	encoding: ImageEncoding,
) -> DepthResult<()> {
	let mut seen = std::collections::HashMap::new();
	for name in names {
		let file = visualization_name(name, encoding);
		if let Some(previous) = seen.insert(file.clone(), name) {
			return Err(DepthError::Configuration(format!(
				"Inputs '{}' and '{}' would both be written to '{}'",
				previous, name, file
			)));
		}
	}
	Ok(())
}

pub fn save_image(image: &RgbImage, path: &Path, encoding: ImageEncoding) -> DepthResult<()> {
	match encoding {
		ImageEncoding::Jpeg { quality } => {
			let file = File::create(path).map_err(|e| {
				DepthError::Storage(format!("Failed to create output file {:?}: {}", path, e))
			})?;

			let mut jpeg_encoder =
				image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(file), quality);
			jpeg_encoder
				.encode(
					image.as_raw(),
					image.width(),
					image.height(),
					image::ExtendedColorType::Rgb8,
				)
				.map_err(|e| DepthError::Storage(format!("Failed to encode JPEG: {}", e)))?;
		}
		ImageEncoding::Png => {
			image
				.save_with_format(path, image::ImageFormat::Png)
				.map_err(|e| DepthError::Storage(format!("Failed to save PNG {:?}: {}", path, e)))?;
		}
	}

	Ok(())
}

pub fn save_array(array: &Array2<f32>, path: &Path) -> DepthResult<()> {
	ndarray_npy::write_npy(path, array)?;
	Ok(())
}

/// Scaled-disparity maps of one run, in processing order.
#[derive(Debug, Default, Clone)]
pub struct PredictionArchive {
	preds: Vec<Array2<f32>>,
}

impl PredictionArchive {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, pred: Array2<f32>) {
		self.preds.push(pred);
	}

	pub fn len(&self) -> usize {
		self.preds.len()
	}

	pub fn is_empty(&self) -> bool {
		self.preds.is_empty()
	}

	/// Per-image key, used only when the maps cannot be stacked.
	pub fn entry_name(index: usize) -> String {
		format!("pred_{:05}", index)
	}

	/// `(N, H, W)` stack, or `None` when the maps differ in shape.
	pub fn stacked(&self) -> Option<Array3<f32>> {
		let first = match self.preds.first() {
			Some(first) => first.dim(),
			None => return Some(Array3::zeros((0, 0, 0))),
		};
		if self.preds.iter().any(|p| p.dim() != first) {
			return None;
		}
		let views: Vec<_> = self.preds.iter().map(|p| p.view()).collect();
		ndarray::stack(Axis(0), &views).ok()
	}

	fn write_npz(&self, path: &Path, stack: Option<&Array3<f32>>, compressed: bool) -> DepthResult<()> {
		let file = File::create(path).map_err(|e| {
			DepthError::Storage(format!("Failed to create archive {:?}: {}", path, e))
		})?;
		let mut npz = if compressed {
			NpzWriter::new_compressed(file)
		} else {
			NpzWriter::new(file)
		};
		match stack {
			Some(stack) => npz.add_array(ARCHIVE_KEY, stack)?,
			None => {
				for (i, pred) in self.preds.iter().enumerate() {
					npz.add_array(Self::entry_name(i), pred)?;
				}
			}
		}
		npz.finish()?;
		Ok(())
	}

	/// Writes the compressed archive and the uncompressed dump. Returns the
	/// paths written.
	///
	/// Equal shapes: `pred.npz` holds one `(N, H, W)` array under `pred` and the
	/// dump is the same stack as `.npy`. Mixed shapes: both are npz files with
	/// one `pred_{index:05}` entry per image.
	pub fn persist(&self, dir: &RunDirectory) -> DepthResult<(PathBuf, PathBuf)> {
		let stack = self.stacked();
		let archive_path = dir.path().join(ARCHIVE_FILE);
		self.write_npz(&archive_path, stack.as_ref(), true)?;

		let dump_path = match &stack {
			Some(stack) => {
				let path = dir.path().join(format!("{}.npy", DUMP_STEM));
				ndarray_npy::write_npy(&path, stack)?;
				path
			}
			None => {
				tracing::warn!("Predictions differ in shape; storing one archive entry per image");
				let path = dir.path().join(format!("{}.npz", DUMP_STEM));
				self.write_npz(&path, None, false)?;
				path
			}
		};

		Ok((archive_path, dump_path))
	}
}
