//! mirada-capture — image acquisition.
//!
//! Two sources produce the same `RgbFrame`: a V4L2 camera and decoded
//! image files ("upload" in the original flow).

pub mod camera;
pub mod frame;
pub mod upload;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::RgbFrame;
pub use upload::UploadError;
