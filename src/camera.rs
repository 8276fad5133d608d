//! Webcam capture and outbound frame encoding.

use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::time::Instant;
use tracing::{debug, info};

/// A raw frame pulled from the capture device. Created each sampling tick
/// and consumed synchronously, never persisted.
pub struct RawFrame {
    pub rgb: RgbImage,
    pub timestamp: Instant,
}

/// Anything that can produce raw frames for the sampler.
///
/// `grab` returns `Ok(None)` while the device has no decodable frame yet;
/// that is an expected per-tick condition, not an error.
pub trait FrameSource: Send {
    fn grab(&mut self) -> Result<Option<RawFrame>>;
    fn release(&mut self);
}

/// Captures frames from the default webcam via `nokhwa`.
pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    /// Acquire the default capture device at (or nearest to) the requested
    /// resolution and start its stream.
    pub fn open(width: u32, height: u32) -> Result<Self> {
        let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
        let mut camera = Camera::new(CameraIndex::Index(0), requested)?;
        camera.open_stream()?;
        info!(
            "capture device open: {} ({:?})",
            camera.info().human_name(),
            camera.camera_format()
        );
        Ok(Self { camera })
    }
}

impl FrameSource for CameraSource {
    fn grab(&mut self) -> Result<Option<RawFrame>> {
        // Early frames routinely fail to decode while the stream warms up.
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                debug!("no frame available: {}", e);
                return Ok(None);
            }
        };
        let rgb = buffer.decode_image::<RgbFormat>()?;
        Ok(Some(RawFrame {
            rgb,
            timestamp: Instant::now(),
        }))
    }

    fn release(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            debug!("stop_stream failed: {}", e);
        }
        info!("capture device released");
    }
}

/// Spatial and quality settings for outbound frames.
#[derive(Debug, Clone, Copy)]
pub struct EncodeConfig {
    /// Spatial reduction applied before encoding, trading fidelity for
    /// bandwidth.
    pub downscale: f32,
    /// JPEG quality on the encoder's 0-100 scale.
    pub jpeg_quality: u8,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            downscale: 0.5,
            jpeg_quality: 50,
        }
    }
}

/// Downscale, mirror and JPEG-encode a raw frame for transport.
///
/// The horizontal flip gives the user a mirror view of themselves; the
/// model sees the same orientation the user does.
pub fn encode_frame(frame: &RawFrame, config: EncodeConfig) -> Result<Vec<u8>> {
    let (width, height) = frame.rgb.dimensions();
    let out_w = ((width as f32 * config.downscale).round() as u32).max(1);
    let out_h = ((height as f32 * config.downscale).round() as u32).max(1);

    let scaled = imageops::resize(&frame.rgb, out_w, out_h, imageops::FilterType::Triangle);
    let mirrored = imageops::flip_horizontal(&scaled);

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality);
    encoder.encode(
        mirrored.as_raw(),
        out_w,
        out_h,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg)
}

/// MIME type of encoded frames.
pub fn mime_type() -> &'static str {
    "image/jpeg"
}
