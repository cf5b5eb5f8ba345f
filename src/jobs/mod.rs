mod pending;
mod record;
mod request;

pub use pending::PendingSet;
pub use record::{JobRecord, JobStatus, default_label};
pub use request::{BatchSlot, GenerationKind, GenerationRequest, InputAsset, Quality};
