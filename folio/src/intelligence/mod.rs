pub mod backfill;
pub mod extractor;
pub mod interests;
pub mod relationship;
pub mod similarity;
pub mod types;

pub use extractor::EntityExtractor;
pub use interests::InterestAnalyzer;
pub use relationship::{RelationshipBands, RelationshipDetector};
pub use types::{Band, DetectionReport, DetectionTarget, ExtractionProposal};
