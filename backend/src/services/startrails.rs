//! Star trail composites: the per-pixel brightest value across a night's frames.

use std::path::{Path, PathBuf};

use super::sequencer::FramePattern;
use crate::error::{Result, SkycamError};

pub trait StarTrailCompositor {
    /// Combines `frames` (in order) into a single image written to `output`.
    fn composite(&self, frames: &[PathBuf], output: &Path) -> Result<()>;
}

/// Output file name for a session, e.g. `star_trails_20240621.jpg`.
pub fn star_trails_name(date_tag: &str) -> String {
    format!("star_trails_{}.jpg", date_tag)
}

/// Composites every sequenced frame in `session_dir` matching `pattern`.
///
/// # Arguments
///
/// * `compositor` - Brightest-pixel stacker
/// * `session_dir` - Sequenced session directory; the output is written here
/// * `pattern` - Frame naming produced by the sequencer
/// * `date_tag` - Session tag used in the output name
///
/// # Returns
///
/// Path of the composite, or [`SkycamError::StarTrails`] if no frame matches.
pub fn build_star_trails(
    compositor: &dyn StarTrailCompositor,
    session_dir: &Path,
    pattern: &FramePattern,
    date_tag: &str,
) -> Result<PathBuf> {
    let frames = pattern.list(session_dir)?;
    if frames.is_empty() {
        return Err(SkycamError::StarTrails {
            message: format!(
                "no frames matching {} in {}",
                pattern.glob(),
                session_dir.display()
            ),
        });
    }
    let output = session_dir.join(star_trails_name(date_tag));
    compositor.composite(&frames, &output)?;
    Ok(output)
}

/// Stand-in used when the crate is built without image support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCompositor;

impl StarTrailCompositor for UnavailableCompositor {
    fn composite(&self, _frames: &[PathBuf], _output: &Path) -> Result<()> {
        Err(SkycamError::StarTrails {
            message: "built without the `startrails` feature".to_string(),
        })
    }
}

#[cfg(feature = "startrails")]
pub use lighten::LightenCompositor;

#[cfg(feature = "startrails")]
mod lighten {
    use super::*;
    use image::{ImageFormat, RgbImage};

    /// Keeps the brightest value of each channel of each pixel.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LightenCompositor;

    fn load(path: &Path) -> Result<RgbImage> {
        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| SkycamError::StarTrails {
                message: format!("cannot read {}: {}", path.display(), e),
            })
    }

    impl StarTrailCompositor for LightenCompositor {
        fn composite(&self, frames: &[PathBuf], output: &Path) -> Result<()> {
            let (first, rest) = frames.split_first().ok_or_else(|| SkycamError::StarTrails {
                message: "no frames to composite".to_string(),
            })?;
            let mut stack = load(first)?;

            for (i, path) in rest.iter().enumerate() {
                let frame = load(path)?;
                if frame.dimensions() != stack.dimensions() {
                    return Err(SkycamError::StarTrails {
                        message: format!(
                            "{} is {:?}, expected {:?}",
                            path.display(),
                            frame.dimensions(),
                            stack.dimensions()
                        ),
                    });
                }
                for (acc, px) in stack.pixels_mut().zip(frame.pixels()) {
                    for (a, b) in acc.0.iter_mut().zip(px.0) {
                        *a = (*a).max(b);
                    }
                }
                if (i + 1) % 100 == 0 {
                    log::debug!("Star trails: {}/{} frames", i + 2, frames.len());
                }
            }

            stack
                .save_with_format(output, ImageFormat::Jpeg)
                .map_err(|e| SkycamError::StarTrails {
                    message: format!("cannot write {}: {}", output.display(), e),
                })
        }
    }
}
