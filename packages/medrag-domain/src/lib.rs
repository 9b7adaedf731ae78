pub mod chunk;
pub mod document;
pub mod recommendation;
pub mod retrieval;

pub use chunk::{Chunk, PageRange};
pub use document::Paragraph;
pub use recommendation::{RecommendationLabeler, RecommendationLabels};
pub use retrieval::{EvidenceBlock, RetrievedChunk};
