//! Typed frame metadata: header extraction with filename fallback, a
//! memoizing cache, and a bounded-parallel batch reader.

mod batch;
mod cache;
mod filename;
mod frame_type;
mod metadata;

pub use batch::{read_batch, BatchOutcome};
pub use cache::MetadataCache;
pub use frame_type::FrameType;
pub use metadata::{exposure_key, format_exposure_fixed3, format_exposure_trimmed, round_to_3_decimals, ImageMetadata};

pub use flatcal_threadpool::CancellationToken;
