//! Media sources behind the decoder: URI resolution and frame production.

use crate::buffer::Buffer;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Defaults for `test://` and file sources.
pub const DEFAULT_DURATION_SECS: u64 = 10;
/// Frames per second when the locator does not say.
pub const DEFAULT_FPS: u32 = 30;
/// Frame payload size when the locator does not say.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Why a source could not be opened or read.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The file does not exist or cannot be opened.
    #[error("Resource not found.")]
    NotFound {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading from an opened resource failed.
    #[error("Could not read from resource.")]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// No source handles this URI scheme.
    #[error("No URI handler for {0}")]
    UnsupportedScheme(String),

    /// The locator is malformed.
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri {
        /// The offending locator.
        uri: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl SourceError {
    /// Developer detail to attach to a bus error.
    pub fn debug_info(&self) -> Option<String> {
        match self {
            SourceError::NotFound { path, source } => Some(format!(
                "could not open {} for reading: {}",
                path.display(),
                source
            )),
            SourceError::Read { path, source } => {
                Some(format!("error reading {}: {}", path.display(), source))
            }
            SourceError::UnsupportedScheme(_) | SourceError::InvalidUri { .. } => None,
        }
    }
}

/// Where frames come from, parsed from a locator string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Synthetic frames.
    Test {
        /// Stream length.
        duration: Duration,
        /// Frames per second.
        fps: u32,
        /// Payload bytes per frame.
        frame_size: usize,
    },
    /// Frames cut from a file.
    File {
        /// File to read.
        path: PathBuf,
        /// Frames per second.
        fps: u32,
        /// Payload bytes per frame.
        frame_size: usize,
    },
}

impl SourceLocation {
    /// Resolve a locator.
    ///
    /// Accepts `test://` (query `duration`, `fps`, `size`), `file://` URIs
    /// (query `fps`, `size`) and plain filesystem paths.
    pub fn parse(uri: &str) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };

        let url = match Url::parse(uri) {
            Ok(url) if url.scheme().len() > 1 => url,
            // Relative paths and Windows drive letters.
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(SourceLocation::File {
                    path: PathBuf::from(uri),
                    fps: DEFAULT_FPS,
                    frame_size: DEFAULT_FRAME_SIZE,
                });
            }
            Err(err) => return Err(invalid(err.to_string())),
        };

        let mut duration = Duration::from_secs(DEFAULT_DURATION_SECS);
        let mut fps = DEFAULT_FPS;
        let mut frame_size = DEFAULT_FRAME_SIZE;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "duration" => {
                    let secs: f64 = value
                        .parse()
                        .map_err(|_| invalid(format!("bad duration '{}'", value)))?;
                    duration = Duration::try_from_secs_f64(secs)
                        .map_err(|_| invalid(format!("bad duration '{}'", value)))?;
                }
                "fps" => {
                    fps = value
                        .parse()
                        .ok()
                        .filter(|fps| *fps > 0)
                        .ok_or_else(|| invalid(format!("bad fps '{}'", value)))?;
                }
                "size" => {
                    frame_size = value
                        .parse()
                        .ok()
                        .filter(|size| *size > 0)
                        .ok_or_else(|| invalid(format!("bad size '{}'", value)))?;
                }
                other => tracing::debug!(%uri, key = other, "ignoring unknown locator parameter"),
            }
        }

        match url.scheme() {
            "test" => Ok(SourceLocation::Test {
                duration,
                fps,
                frame_size,
            }),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| invalid("not a local file path".to_string()))?;
                Ok(SourceLocation::File {
                    path,
                    fps,
                    frame_size,
                })
            }
            scheme => Err(SourceError::UnsupportedScheme(scheme.to_string())),
        }
    }

    /// Open the source.
    pub fn open(&self) -> Result<MediaSource, SourceError> {
        match self {
            SourceLocation::Test {
                duration,
                fps,
                frame_size,
            } => {
                let frames = (duration.as_secs_f64() * f64::from(*fps)).ceil() as u64;
                Ok(MediaSource::new(
                    Frames::Synthetic { remaining: frames },
                    *fps,
                    *frame_size,
                ))
            }
            SourceLocation::File {
                path,
                fps,
                frame_size,
            } => {
                let file = File::open(path).map_err(|source| SourceError::NotFound {
                    path: path.clone(),
                    source,
                })?;
                Ok(MediaSource::new(
                    Frames::File {
                        file,
                        path: path.clone(),
                    },
                    *fps,
                    *frame_size,
                ))
            }
        }
    }
}

enum Frames {
    Synthetic { remaining: u64 },
    File { file: File, path: PathBuf },
}

/// An opened source producing timestamped frames.
pub struct MediaSource {
    frames: Frames,
    frame_size: usize,
    frame_duration: Duration,
    sequence: u64,
}

impl MediaSource {
    fn new(frames: Frames, fps: u32, frame_size: usize) -> Self {
        Self {
            frames,
            frame_size,
            frame_duration: Duration::from_secs(1) / fps.max(1),
            sequence: 0,
        }
    }

    /// Timestamp of the next frame.
    pub fn next_pts(&self) -> Duration {
        let nanos = self.frame_duration.as_nanos() * u128::from(self.sequence);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Number of frames produced so far.
    pub fn position(&self) -> u64 {
        self.sequence
    }

    /// Path of a file source.
    pub fn path(&self) -> Option<&Path> {
        match &self.frames {
            Frames::File { path, .. } => Some(path),
            Frames::Synthetic { .. } => None,
        }
    }

    /// Produce the next frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Buffer>, SourceError> {
        let data = match &mut self.frames {
            Frames::Synthetic { remaining } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                *remaining -= 1;
                vec![(self.sequence & 0xff) as u8; self.frame_size]
            }
            Frames::File { file, path } => {
                let mut data = vec![0u8; self.frame_size];
                let mut filled = 0;
                while filled < data.len() {
                    match file.read(&mut data[filled..]) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(source) => {
                            return Err(SourceError::Read {
                                path: path.clone(),
                                source,
                            });
                        }
                    }
                }
                if filled == 0 {
                    return Ok(None);
                }
                data.truncate(filled);
                data
            }
        };

        let buffer =
            Buffer::new(data, self.sequence).with_timing(self.next_pts(), self.frame_duration);
        self.sequence += 1;
        Ok(Some(buffer))
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("path", &self.path())
            .field("frame_size", &self.frame_size)
            .field("frame_duration", &self.frame_duration)
            .field("position", &self.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_test_uri_defaults() {
        assert_eq!(
            SourceLocation::parse("test://").unwrap(),
            SourceLocation::Test {
                duration: Duration::from_secs(10),
                fps: 30,
                frame_size: 4096,
            }
        );
    }

    #[test]
    fn test_parse_test_uri_query() {
        assert_eq!(
            SourceLocation::parse("test://?duration=0.5&fps=10&size=16").unwrap(),
            SourceLocation::Test {
                duration: Duration::from_millis(500),
                fps: 10,
                frame_size: 16,
            }
        );
        assert!(matches!(
            SourceLocation::parse("test://?fps=0"),
            Err(SourceError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_parse_paths() {
        assert!(matches!(
            SourceLocation::parse("file:///tmp/video.raw").unwrap(),
            SourceLocation::File { ref path, .. } if path == Path::new("/tmp/video.raw")
        ));
        assert!(matches!(
            SourceLocation::parse("clips/video.raw").unwrap(),
            SourceLocation::File { ref path, .. } if path == Path::new("clips/video.raw")
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = SourceLocation::parse("rtsp://camera/stream").unwrap_err();
        assert_eq!(err.to_string(), "No URI handler for rtsp");
    }

    #[test]
    fn test_missing_file() {
        let err = SourceLocation::parse("/nonexistent/teeswap/input.raw")
            .unwrap()
            .open()
            .unwrap_err();
        assert_eq!(err.to_string(), "Resource not found.");
        assert!(err.debug_info().unwrap().contains("/nonexistent/teeswap/input.raw"));
    }

    #[test]
    fn test_synthetic_frames() {
        let mut source = SourceLocation::parse("test://?duration=1&fps=4&size=8")
            .unwrap()
            .open()
            .unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[2].pts(), Duration::from_millis(500));
        assert_eq!(frames[3].duration(), Duration::from_millis(250));
        assert_eq!(frames[1].len(), 8);
    }

    #[test]
    fn test_pts_keeps_growing_past_u32_frames() {
        let mut source = SourceLocation::parse("test://?fps=25&size=1")
            .unwrap()
            .open()
            .unwrap();
        source.sequence = u64::from(u32::MAX);
        let before = source.next_pts();
        source.sequence += 1;
        let after = source.next_pts();

        assert_eq!(after - before, Duration::from_millis(40));
        assert_eq!(after, Duration::from_millis(40 * (1u64 << 32)));
    }

    #[test]
    fn test_file_frames() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 20]).unwrap();

        let uri = format!("{}?size=8", Url::from_file_path(file.path()).unwrap());
        let mut source = SourceLocation::parse(&uri).unwrap().open().unwrap();
        let sizes: Vec<usize> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|frame| frame.len())
            .collect();
        assert_eq!(sizes, vec![8, 8, 4]);
    }
}
