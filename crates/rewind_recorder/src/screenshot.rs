//! Screenshots taken around recorded and replayed actions.
//!
//! Hosts that can read back their framebuffer implement [`ScreenCapture`].
//! The engine schedules two captures per non-drag action, one right away and
//! one after a short delay, and writes them as PNG files.

use std::path::{Path, PathBuf};

/// Raw captured framebuffer data.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    /// Raw pixel data (RGBA8)
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(data, width, height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the buffer holds exactly one RGBA8 value per pixel.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.pixel_count() * 4
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let pixel = self.data.get(idx..idx + 4)?;
        Some([pixel[0], pixel[1], pixel[2], pixel[3]])
    }
}

/// Source of screenshots, implemented by the host.
pub trait ScreenCapture {
    /// Read back the current frame, `None` if nothing is rendered yet.
    fn capture(&mut self) -> Option<CapturedFrame>;
}

/// Writes captured frames to disk.
pub struct ScreenshotExporter;

impl ScreenshotExporter {
    /// Export a captured frame as PNG.
    #[cfg(feature = "png")]
    pub fn save_png(frame: &CapturedFrame, path: impl AsRef<Path>) -> std::io::Result<()> {
        use std::fs::File;
        use std::io::BufWriter;

        if !frame.is_well_formed() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "frame buffer holds {} bytes, expected {}",
                    frame.data.len(),
                    frame.pixel_count() * 4
                ),
            ));
        }

        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        let mut encoder = png::Encoder::new(writer, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header().map_err(std::io::Error::other)?;

        writer
            .write_image_data(&frame.data)
            .map_err(std::io::Error::other)?;

        Ok(())
    }

    #[cfg(not(feature = "png"))]
    pub fn save_png(_frame: &CapturedFrame, _path: impl AsRef<Path>) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "built without the png feature",
        ))
    }
}

/// Pending captures and where their files go.
#[derive(Debug)]
pub(crate) struct ScreenshotSchedule {
    folder: PathBuf,
    delay: f64,
    due: Vec<f64>,
    taken: usize,
}

impl ScreenshotSchedule {
    pub(crate) fn new(folder: PathBuf, delay: f64) -> Self {
        Self {
            folder,
            delay,
            due: Vec::new(),
            taken: 0,
        }
    }

    pub(crate) fn folder(&self) -> &Path {
        &self.folder
    }

    /// Capture now and again after the delay.
    pub(crate) fn schedule_around(&mut self, now: f64) {
        self.due.push(now);
        self.due.push(now + self.delay);
    }

    /// Remove and count captures due at `now`.
    pub(crate) fn take_due(&mut self, now: f64) -> usize {
        let before = self.due.len();
        self.due.retain(|at| *at > now);
        before - self.due.len()
    }

    pub(crate) fn next_path(&mut self, prefix: &str) -> PathBuf {
        self.taken += 1;
        self.folder.join(format!("{prefix} screenshot {}.png", self.taken))
    }

    pub(crate) fn clear(&mut self) {
        self.due.clear();
    }
}
