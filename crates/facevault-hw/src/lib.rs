//! facevault-hw — Camera capture for the live recognition loop.
//!
//! Provides V4L2-based camera access with conversion of YUYV, GREY and Y16
//! buffers into RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, FrameStream, PixelFormat};
pub use frame::{Frame, FrameError};
