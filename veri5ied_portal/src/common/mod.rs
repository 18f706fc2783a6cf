mod error;

pub use error::{
    GatewayError, Result, StorageError, SubmissionError, ValidationError, ValidationErrors,
};
