mod backend;
mod backends;
mod filter;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{HttpBackend, StubBackend};
pub use filter::{iou, DetectionFilter};
pub use registry::BackendRegistry;
pub use result::{Detection, DetectionResult, ObjectClass};
