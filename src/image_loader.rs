use crate::config::InputSource;
use crate::error::{DepthError, DepthResult};
use image::RgbImage;
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

/// One image of a run: where to read it and what to call its outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageEntry {
	pub path: PathBuf,
	pub name: String,
}

pub fn is_supported(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
		.unwrap_or(false)
}

/// Decodes an image and converts it to 8-bit RGB.
pub fn load_image(path: impl AsRef<Path>) -> DepthResult<RgbImage> {
	let path = path.as_ref();

	if !path.exists() {
		return Err(DepthError::Input(format!("Image file not found: {:?}", path)));
	}
	if !is_supported(path) {
		return Err(DepthError::Input(format!("Unsupported image format: {:?}", path)));
	}

	let img = image::open(path)
		.map_err(|e| DepthError::Input(format!("Failed to load image {:?}: {}", path, e)))?;
	Ok(img.to_rgb8())
}

/// Resolves the configured input into an ordered list of images.
pub fn collect_inputs(source: &InputSource, image_root: Option<&Path>) -> DepthResult<Vec<ImageEntry>> {
	match source {
		InputSource::ListFile(list) => {
			let root = match image_root {
				Some(root) => root.to_path_buf(),
				None => list.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
			};
			read_image_list(list, &root)
		}
		InputSource::Directory(dir) => scan_directory(dir),
	}
}

/// Reads a list file of relative image paths, one per line, and orders the
/// entries naturally.
pub fn read_image_list(list: &Path, root: &Path) -> DepthResult<Vec<ImageEntry>> {
	let raw = std::fs::read_to_string(list).map_err(|e| {
		DepthError::Configuration(format!("Failed to read image list {:?}: {}", list, e))
	})?;

	let mut lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
	lines.sort_by(|a, b| natural_cmp(a, b));

	Ok(lines
		.into_iter()
		.map(|line| ImageEntry {
			path: root.join(line),
			name: output_name(Path::new(line)),
		})
		.collect())
}

pub fn scan_directory(dir: &Path) -> DepthResult<Vec<ImageEntry>> {
	let entries = std::fs::read_dir(dir).map_err(|e| {
		DepthError::Configuration(format!("Failed to read input directory {:?}: {}", dir, e))
	})?;

	let mut names = Vec::new();
	for entry in entries {
		let path = entry?.path();
		if path.is_file() && is_supported(&path) {
			if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
				names.push(name.to_string());
			}
		}
	}
	names.sort_by(|a, b| natural_cmp(a, b));

	Ok(names
		.into_iter()
		.map(|name| ImageEntry {
			path: dir.join(&name),
			name,
		})
		.collect())
}

/// Flattens a relative path into a single file name: `a/b/c.png` -> `a_b_c.png`.
pub fn output_name(relative: &Path) -> String {
	relative
		.components()
		.filter_map(|c| match c {
			Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("_")
}

/// Orders strings so that digit runs compare by value: `img2` < `img10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
	let mut a = a.chars().peekable();
	let mut b = b.chars().peekable();

	loop {
		match (a.peek().copied(), b.peek().copied()) {
			(None, None) => return Ordering::Equal,
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
				let da = take_digits(&mut a);
				let db = take_digits(&mut b);
				let ta = da.trim_start_matches('0');
				let tb = db.trim_start_matches('0');
				let ord = ta
					.len()
					.cmp(&tb.len())
					.then_with(|| ta.cmp(tb))
					.then_with(|| da.len().cmp(&db.len()));
				if ord != Ordering::Equal {
					return ord;
				}
			}
			(Some(x), Some(y)) => {
				if x != y {
					return x.cmp(&y);
				}
				a.next();
				b.next();
			}
		}
	}
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
	let mut digits = String::new();
	while let Some(c) = chars.peek().copied() {
		if !c.is_ascii_digit() {
			break;
		}
		digits.push(c);
		chars.next();
	}
	digits
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn natural_order() {
		let mut names = vec!["img10.png", "img2.png", "img1.png", "a/img3.png", "img02.png"];
		names.sort_by(|a, b| natural_cmp(a, b));
		assert_eq!(names, vec!["a/img3.png", "img1.png", "img2.png", "img02.png", "img10.png"]);
	}

	#[test]
	fn flattens_relative_paths() {
		assert_eq!(output_name(Path::new("scene_01/left/0001.png")), "scene_01_left_0001.png");
		assert_eq!(output_name(Path::new("./x.jpg")), "x.jpg");
	}

	#[test]
	fn list_file_is_sorted_and_rooted() {
		let tmp = tempfile::tempdir().unwrap();
		let list = tmp.path().join("val.txt");
		std::fs::write(&list, "s/10.png\n\ns/9.png\n  s/1.png  \n").unwrap();

		let entries = collect_inputs(&InputSource::ListFile(list), None).unwrap();
		let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
		assert_eq!(names, vec!["s_1.png", "s_9.png", "s_10.png"]);
		assert_eq!(entries[0].path, tmp.path().join("s/1.png"));

		let rooted = collect_inputs(
			&InputSource::ListFile(tmp.path().join("val.txt")),
			Some(Path::new("/data")),
		)
		.unwrap();
		assert_eq!(rooted[2].path, PathBuf::from("/data/s/10.png"));
	}

	#[test]
	fn directory_scan_skips_other_files() {
		let tmp = tempfile::tempdir().unwrap();
		for name in ["b.png", "a.JPG", "notes.txt"] {
			std::fs::write(tmp.path().join(name), b"").unwrap();
		}
		let entries = scan_directory(tmp.path()).unwrap();
		let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
		assert_eq!(names, vec!["a.JPG", "b.png"]);
	}

	#[test]
	fn missing_and_undecodable_images() {
		let tmp = tempfile::tempdir().unwrap();
		assert!(matches!(
			load_image(tmp.path().join("absent.png")),
			Err(DepthError::Input(_))
		));

		let broken = tmp.path().join("broken.png");
		std::fs::write(&broken, b"not a png").unwrap();
		assert!(matches!(load_image(&broken), Err(DepthError::Input(_))));
	}

	#[test]
	fn loads_rgb() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("gray.png");
		image::GrayImage::from_pixel(3, 2, image::Luma([128])).save(&path).unwrap();
		let img = load_image(&path).unwrap();
		assert_eq!(img.dimensions(), (3, 2));
		assert_eq!(img.get_pixel(0, 0), &image::Rgb([128, 128, 128]));
	}
}
