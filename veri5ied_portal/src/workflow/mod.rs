//! User-facing workflows built on the ledger and image store clients.

pub mod batch;
pub mod scanner;
pub mod submission;
pub mod verification;

pub use batch::{verify_batch, BatchEntry, BatchReport, BatchStatus};
pub use scanner::{identifier_from_scan, ChannelSource, CodeSource, LineSource, ScanSession};
pub use submission::{
    generate_short_product_id, Confirmation, DraftImage, SubmissionDraft, SubmissionReceipt,
    SubmissionWorkflow,
};
pub use verification::{
    lookup_product, Completion, VerificationResult, VerificationState, VerificationWorkflow,
};
