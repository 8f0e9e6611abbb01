use std::future::Future;
use std::pin::Pin;

use evalia_core::models::submission::{SubmissionAck, SubmissionRequest};

use crate::error::SubmitError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The backend submission endpoint.
///
/// An `Ok` acknowledgment is final, accepted or not. An `Err` means the
/// submission may not have arrived and the learner can retry.
pub trait Submitter: Send + Sync {
    fn submit<'a>(
        &'a self,
        request: &'a SubmissionRequest,
    ) -> BoxFuture<'a, Result<SubmissionAck, SubmitError>>;
}
