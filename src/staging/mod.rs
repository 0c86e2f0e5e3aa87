pub mod compress;
pub mod manager;
pub mod preview;

pub use compress::{compress, CompressedImage, CompressionOptions, LocalFile};
pub use manager::{ImageStagingManager, StageId, StageOrigin, StagedImage, StagingState};
pub use preview::{Preview, PreviewRegistry, TransientPreview};
