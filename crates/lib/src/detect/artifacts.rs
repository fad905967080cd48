//! Debug copies of the latest detection.
//!
//! Each detection replaces two JPEGs in the artifact directory: the full image
//! with the box outlined and the boxed region on its own. They are never
//! served back to clients, and the directory never holds more than the last
//! pair.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use super::{DetectError, Detection};
use crate::Result;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;

pub const ANNOTATED_FILE: &str = "annotated.jpg";
pub const CROPPED_FILE: &str = "cropped.jpg";

/// Where the artifacts of one detection were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub annotated: PathBuf,
    pub cropped: PathBuf,
}

/// Writes annotated and cropped copies of detected images.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Replace both artifacts with copies of `detection` found in `image`.
    ///
    /// Blocking; call from a blocking context.
    pub fn write(&self, image: &DynamicImage, detection: &Detection) -> Result<ArtifactPaths> {
        std::fs::create_dir_all(&self.dir).map_err(|e| DetectError::ArtifactFailed {
            path: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let paths = ArtifactPaths {
            annotated: self.dir.join(ANNOTATED_FILE),
            cropped: self.dir.join(CROPPED_FILE),
        };

        let (width, height) = (image.width(), image.height());
        let bbox = detection.bbox.clip(width, height);
        let x = bbox.xmin as u32;
        let y = bbox.ymin as u32;
        let w = ((bbox.xmax as u32).saturating_sub(x)).max(1).min(width.saturating_sub(x).max(1));
        let h = ((bbox.ymax as u32).saturating_sub(y)).max(1).min(height.saturating_sub(y).max(1));

        let mut annotated = image.to_rgb8();
        for inset in 0..BOX_THICKNESS {
            let rw = w as i32 - 2 * inset;
            let rh = h as i32 - 2 * inset;
            if rw <= 0 || rh <= 0 {
                break;
            }
            let rect = Rect::at(x as i32 + inset, y as i32 + inset).of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(&mut annotated, rect, BOX_COLOR);
        }
        replace(&annotated, &paths.annotated)?;

        let cropped = image.crop_imm(x, y, w, h).to_rgb8();
        replace(&cropped, &paths.cropped)?;

        Ok(paths)
    }
}

fn artifact_failed(path: &Path, reason: impl ToString) -> crate::Error {
    DetectError::ArtifactFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Write `image` next to `path` and rename it into place, so concurrent
/// requests never leave a half-written file behind.
fn replace(image: &image::RgbImage, path: &Path) -> Result<()> {
    let staging = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    if let Err(e) = image.save_with_format(&staging, ImageFormat::Jpeg) {
        let _ = std::fs::remove_file(&staging);
        return Err(artifact_failed(&staging, e));
    }
    std::fs::rename(&staging, path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        artifact_failed(path, e)
    })
}
