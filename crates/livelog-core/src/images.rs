//! Image handler: one encoded file per (step, name).

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::data::DataHandler;
use crate::error::{LiveError, Result};
use crate::models::ImageValue;
use crate::storage;

/// Extensions the `image` crate is built to encode here.
pub const SUFFIXES: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

#[derive(Debug)]
pub struct Image {
    name: String,
    output_folder: PathBuf,
    val: Option<ImageValue>,
    step: Option<u64>,
}

impl Image {
    pub const SUBFOLDER: &'static str = "images";

    pub fn new(name: &str, root: &Path) -> Self {
        Self {
            name: name.to_string(),
            output_folder: root.join(Self::SUBFOLDER),
            val: None,
            step: None,
        }
    }

    /// The name must carry a supported extension; a pixel buffer must match its
    /// declared geometry.
    pub fn could_log(name: &str, value: &ImageValue) -> bool {
        if !has_supported_suffix(name) {
            return false;
        }
        match value {
            ImageValue::Decoded(_) => true,
            ImageValue::Pixels {
                width,
                height,
                channels,
                data,
            } => {
                matches!(channels, 1 | 3 | 4)
                    && *width > 0
                    && *height > 0
                    && data.len() == *width as usize * *height as usize * *channels as usize
            }
        }
    }

    /// What `could_log` saw, for error messages.
    pub fn describe(name: &str, value: &ImageValue) -> String {
        if has_supported_suffix(name) {
            value.describe()
        } else {
            "image name without supported extension".to_string()
        }
    }

    /// `images/<step>/<name>`, or `images/<name>` before any step is set.
    pub fn output_path(&self, step: Option<u64>) -> PathBuf {
        let folder = match step {
            Some(step) => self.output_folder.join(step.to_string()),
            None => self.output_folder.clone(),
        };
        storage::join_name(&folder, &self.name)
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    fn encode(&self, value: &ImageValue, path: &Path) -> Result<()> {
        let img = to_dynamic(&self.name, value)?;
        storage::ensure_parent(path)?;
        match extension(&self.name).as_deref() {
            // JPEG has no alpha channel.
            Some("jpg" | "jpeg") => DynamicImage::ImageRgb8(img.to_rgb8()).save(path)?,
            // The GIF encoder only takes RGB(A).
            Some("gif") => DynamicImage::ImageRgba8(img.to_rgba8()).save(path)?,
            _ => img.save(path)?,
        }
        Ok(())
    }
}

impl DataHandler for Image {
    type Value = ImageValue;

    fn name(&self) -> &str {
        &self.name
    }

    fn dump(&mut self, value: ImageValue, step: Option<u64>) -> Result<()> {
        let path = self.output_path(step);
        self.encode(&value, &path)?;
        self.val = Some(value);
        self.step = step;
        Ok(())
    }

    fn redump(&mut self, step: u64) -> Result<()> {
        match self.val.take() {
            Some(val) => {
                let result = self.encode(&val, &self.output_path(Some(step)));
                self.val = Some(val);
                result?;
                self.step = Some(step);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

fn has_supported_suffix(name: &str) -> bool {
    extension(name).is_some_and(|ext| SUFFIXES.contains(&ext.as_str()))
}

fn to_dynamic(name: &str, value: &ImageValue) -> Result<DynamicImage> {
    match value {
        ImageValue::Decoded(img) => Ok(img.clone()),
        ImageValue::Pixels {
            width,
            height,
            channels,
            data,
        } => {
            let img = match channels {
                1 => GrayImage::from_raw(*width, *height, data.clone()).map(DynamicImage::ImageLuma8),
                3 => RgbImage::from_raw(*width, *height, data.clone()).map(DynamicImage::ImageRgb8),
                4 => RgbaImage::from_raw(*width, *height, data.clone()).map(DynamicImage::ImageRgba8),
                _ => None,
            };
            img.ok_or_else(|| LiveError::invalid_data(name, value.describe()))
        }
    }
}
