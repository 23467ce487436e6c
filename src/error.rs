use thiserror::Error;

pub type DepthResult<T> = Result<T, DepthError>;

#[derive(Debug, Error)]
pub enum DepthError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Model load error: {0}")]
	ModelLoad(#[from] ModelLoadError),
	#[error("Input error: {0}")]
	Input(String),
	#[error("Numeric error: {0}")]
	Numeric(#[from] NumericError),
	#[error("Inference error: {0}")]
	Inference(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelLoadError {
	#[error("decoder expects encoder channels {decoder:?} but encoder declares {encoder:?}")]
	IncompatibleWeights {
		encoder: Vec<usize>,
		decoder: Vec<usize>,
	},
	#[error("encoder weights carry no trained input {0}")]
	MissingMetadata(&'static str),
	#[error("{component} is on {actual} but the run is configured for {expected}")]
	DeviceMismatch {
		component: &'static str,
		expected: crate::config::Device,
		actual: crate::config::Device,
	},
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum NumericError {
	#[error("invalid depth bounds: need 0 < min_depth < max_depth, got min={min_depth} max={max_depth}")]
	InvalidDepthBounds { min_depth: f32, max_depth: f32 },
}

impl From<std::io::Error> for DepthError {
	fn from(e: std::io::Error) -> Self {
		DepthError::Storage(e.to_string())
	}
}

impl From<image::ImageError> for DepthError {
	fn from(e: image::ImageError) -> Self {
		DepthError::Input(e.to_string())
	}
}

impl From<ndarray_npy::WriteNpyError> for DepthError {
	fn from(e: ndarray_npy::WriteNpyError) -> Self {
		DepthError::Storage(format!("Failed to write array: {}", e))
	}
}

impl From<ndarray_npy::WriteNpzError> for DepthError {
	fn from(e: ndarray_npy::WriteNpzError) -> Self {
		DepthError::Storage(format!("Failed to write archive: {}", e))
	}
}
