pub mod chunk;
pub mod driver;
pub mod source;
pub mod staging;

pub use chunk::{resolve_chunk_count, ChunkBounds, ChunkPlan};
pub use driver::{collapse_chunked, collapse_chunked_with_progress};
pub use source::{MappedStack, MappedStackBuilder, StackChunk, StackSource};
pub use staging::{ChunkSink, DiskStaging, MappedArray, MemoryStaging, StagingArea};
