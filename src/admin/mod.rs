pub mod commit;
pub mod panel;

pub use commit::{
    allocate_upload_path, commit_listing, sanitize_file_name, CommitMode, CommitOutcome,
    CommitRequest, CoverResolution,
};
pub use panel::{AdminPanel, DeleteOutcome};
