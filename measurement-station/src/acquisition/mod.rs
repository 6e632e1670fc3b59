//! Measurement acquisition.

pub mod capture;
pub mod lifecycle;

pub use capture::{CaptureChannel, CaptureDevice, CaptureError, CaptureOutcome, PlaceholderCapture};
pub use lifecycle::AcquisitionLifecycle;
