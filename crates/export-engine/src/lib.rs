//! framecast Export Engine
//!
//! Streams a range of rendered frames into an encoder while reporting
//! throttled progress with an adaptive percentage precision and an ETA.
//!
//! # Pipeline Architecture
//!
//! ```text
//! FrameSource ──render(n)──┐
//!   (cache scoped)         │
//!                          ▼
//!                     ExportLoop ──write──▶ Sink (raw file / ffmpeg)
//!                      │      ▲
//!        display tick? │      │ cancel flag (polled per frame)
//!                      ▼      │
//!                  Estimator  CancelFlag
//!                      │
//!                      ▼
//!               ExportObserver ──▶ progress channel ──▶ host UI
//! ```

pub mod error;
pub mod estimator;
pub mod export;
pub mod ffmpeg;
pub mod progress;
pub mod sink;
pub mod source;
pub mod throttle;

pub use error::*;
pub use estimator::*;
pub use export::*;
pub use progress::*;
pub use sink::*;
pub use source::*;
pub use throttle::*;
