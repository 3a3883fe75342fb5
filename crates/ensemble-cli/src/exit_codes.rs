//! Process exit codes. These are part of the command-line contract.

use ensemble_core::{EnsembleError, ErrorKind};

pub const SUCCESS: i32 = 0;
pub const MEMBER_FAILED: i32 = 1; // At least one member failed after dispatch
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, specs, tables or config files
pub const DIRECTORY_EXISTS: i32 = 3; // Experiment directory in the way, no --force
pub const SUBMISSION_FAILED: i32 = 4; // Scheduler rejected or lost a job

fn ensemble_error(e: &anyhow::Error) -> Option<&EnsembleError> {
    e.chain().find_map(|cause| cause.downcast_ref::<EnsembleError>())
}

pub fn for_error(e: &anyhow::Error) -> i32 {
    match ensemble_error(e).map(EnsembleError::kind) {
        Some(ErrorKind::DirectoryExists) => DIRECTORY_EXISTS,
        Some(ErrorKind::SubmissionFailure) => SUBMISSION_FAILED,
        _ => CONFIG_ERROR,
    }
}

pub fn remedy(e: &anyhow::Error) -> Option<&'static str> {
    ensemble_error(e).and_then(EnsembleError::remedy)
}
