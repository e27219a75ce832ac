pub mod generation;
pub mod ids;
pub mod record;

pub use generation::{DatasetGeneration, GenerationManifest};
pub use ids::RecordId;
pub use record::{CanonicalRecord, Metadata};
