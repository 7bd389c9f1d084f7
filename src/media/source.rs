//! Frame sources: video files and ordered image sequences.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use opencv::{imgcodecs, imgcodecs::IMREAD_COLOR};

use crate::error::{Error, Result};
use crate::storage::hash::content_hash;

/// Fallback frame rate when the container does not report one.
const DEFAULT_FPS: f64 = 30.0;

/// What to open: a single video file or an ordered list of images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaDescriptor {
    Video(PathBuf),
    ImageSequence(Vec<PathBuf>),
}

impl MediaDescriptor {
    /// The file whose prefix the content fingerprint is computed from.
    pub fn primary_path(&self) -> Option<&Path> {
        match self {
            MediaDescriptor::Video(p) => Some(p),
            MediaDescriptor::ImageSequence(paths) => paths.first().map(|p| p.as_path()),
        }
    }

    /// Number of files behind this descriptor.
    pub fn file_count(&self) -> usize {
        match self {
            MediaDescriptor::Video(_) => 1,
            MediaDescriptor::ImageSequence(paths) => paths.len(),
        }
    }

    /// Base names of all files, recorded in snapshots for provenance.
    pub fn base_names(&self) -> Vec<String> {
        let name = |p: &PathBuf| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        match self {
            MediaDescriptor::Video(p) => vec![name(p)],
            MediaDescriptor::ImageSequence(paths) => paths.iter().map(name).collect(),
        }
    }
}

/// Metadata about an opened source, sent to the UI on open and consulted
/// by the storage layer for snapshot provenance.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Total number of frames.
    pub length: u32,
    /// Native frame rate of the source.
    pub fps: f64,
    /// Content fingerprint (bounded prefix + file count).
    pub hash: String,
    /// Base names of the source files.
    pub base_names: Vec<String>,
}

/// Abstract frame source. Implementations own their decoder state.
pub trait MediaSource: Send {
    /// Total number of frames, known up front.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native frame rate, if the source knows one.
    fn fps(&self) -> f64 {
        DEFAULT_FPS
    }

    /// Decode the frame at `index`. `index` must be < `len()`; callers
    /// clamp before fetching.
    fn fetch(&mut self, index: u32) -> Result<Mat>;
}

/// Open a descriptor, choosing the backend by its variant.
pub fn open(descriptor: &MediaDescriptor) -> Result<(Box<dyn MediaSource>, MediaInfo)> {
    let source: Box<dyn MediaSource> = match descriptor {
        MediaDescriptor::Video(path) => Box::new(VideoSource::open(path)?),
        MediaDescriptor::ImageSequence(paths) => Box::new(ImageSequenceSource::open(paths)?),
    };
    let info = MediaInfo {
        length: source.len(),
        fps: source.fps(),
        hash: content_hash(descriptor)?,
        base_names: descriptor.base_names(),
    };
    Ok((source, info))
}

/// Video file source backed by OpenCV's `VideoCapture`.
pub struct VideoSource {
    capture: VideoCapture,
    length: u32,
    fps: f64,
    /// Frame index the decoder will produce on the next sequential read.
    next_index: u32,
}

impl VideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let path_str = path.to_string_lossy();
        let capture = VideoCapture::from_file(&path_str, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::InvalidFile(path_str.into_owned()));
        }
        let length = capture.get(videoio::CAP_PROP_FRAME_COUNT)? as u32;
        if length == 0 {
            return Err(Error::InvalidFile(format!("{path_str}: no frames")));
        }
        let fps = match capture.get(videoio::CAP_PROP_FPS)? {
            f if f > 0.0 => f,
            _ => DEFAULT_FPS,
        };
        Ok(Self {
            capture,
            length,
            fps,
            next_index: 0,
        })
    }
}

impl MediaSource for VideoSource {
    fn len(&self) -> u32 {
        self.length
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn fetch(&mut self, index: u32) -> Result<Mat> {
        // Sequential reads avoid a seek; anything else repositions the
        // decoder first.
        if index != self.next_index {
            self.capture
                .set(videoio::CAP_PROP_POS_FRAMES, index as f64)?;
        }
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            self.next_index = index;
            return Err(Error::InvalidFile(format!(
                "decode failed at frame {index}"
            )));
        }
        self.next_index = index + 1;
        Ok(frame)
    }
}

/// Ordered list of single-image files.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
}

impl ImageSequenceSource {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::InvalidFile("empty image list".into()));
        }
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(Error::FileNotFound(missing.clone()));
        }
        Ok(Self {
            paths: paths.to_vec(),
        })
    }
}

impl MediaSource for ImageSequenceSource {
    fn len(&self) -> u32 {
        self.paths.len() as u32
    }

    fn fetch(&mut self, index: u32) -> Result<Mat> {
        let path = self
            .paths
            .get(index as usize)
            .ok_or(Error::InvalidFile(format!("no image at index {index}")))?;
        let image = imgcodecs::imread(&path.to_string_lossy(), IMREAD_COLOR)?;
        if image.empty() {
            return Err(Error::InvalidFile(path.to_string_lossy().into_owned()));
        }
        Ok(image)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_video_is_file_not_found() {
        let err = VideoSource::open(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_empty_image_list_rejected() {
        let err = ImageSequenceSource::open(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidFile(_)));
    }

    #[test]
    fn test_missing_image_rejected() {
        let err =
            ImageSequenceSource::open(&[PathBuf::from("/nonexistent/frame0.png")]).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_base_names() {
        let d = MediaDescriptor::ImageSequence(vec![
            PathBuf::from("/data/a.png"),
            PathBuf::from("/data/b.png"),
        ]);
        assert_eq!(d.base_names(), vec!["a.png", "b.png"]);
        assert_eq!(d.file_count(), 2);
    }
}
