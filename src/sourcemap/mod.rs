mod index;
mod types;

pub use index::SourceMapIndex;
pub use types::{GeneratedPosition, GeneratedToOriginal, OriginalPosition, OriginalToGenerated, Rename};
