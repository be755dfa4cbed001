mod capture;
mod pipeline;
mod upload;
#[cfg(test)]
mod tests;

pub use capture::{CaptureService, CommandCapture};
pub use pipeline::{EvidencePipeline, EvidenceTimings};
pub use upload::{ObjectStore, S3ObjectStore};
