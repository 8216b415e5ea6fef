use std::fs;
use std::path::{Path, PathBuf};

use idcapture_core::{GrayImage, ImageBufferError};
use idcapture_vision::from_luma_image;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("frame source has no frames")]
    Exhausted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Buffer(#[from] ImageBufferError),
}

/// Yields camera frames on demand.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<GrayImage, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<GrayImage, SourceError> {
        (**self).next_frame()
    }
}

/// Replays image files as camera frames, in file-name order.
///
/// Once the files run out the last frame is repeated, like a camera pointed
/// at a still scene.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    last: Option<GrayImage>,
}

impl ImageSequenceSource {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next: 0,
            last: None,
        }
    }

    /// All decodable image files directly inside `dir`, sorted by name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();
        log::debug!("image sequence with {} frames", paths.len());
        Ok(Self::from_paths(paths))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<GrayImage, SourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return self.last.clone().ok_or(SourceError::Exhausted);
        };
        let img = image::open(path).map_err(|source| SourceError::Decode {
            path: path.clone(),
            source,
        })?;
        let frame = from_luma_image(img.to_luma8());
        self.next += 1;
        self.last = Some(frame.clone());
        Ok(frame)
    }
}
