//! Context and command queue.

use tracing::debug;

use crate::backend::ComputeApi;
use crate::error::DispatchPhase;
use crate::{ComputeError, ComputeResult};

/// A context holding one device and one in-order queue on it.
///
/// Submission order on the queue equals completion order; the pipeline
/// relies on that instead of explicit events.
pub struct ExecutionContext<A: ComputeApi> {
    // Field order is drop order: the queue is released before its context.
    queue: A::Queue,
    context: A::Context,
}

impl<A: ComputeApi> ExecutionContext<A> {
    /// Create the context and its queue for `device`.
    pub fn create(api: &A, device: &A::Device) -> ComputeResult<Self> {
        let context = api.create_context(device).map_err(ComputeError::ContextCreation)?;
        debug!("Context created");
        let queue = api
            .create_queue(&context, device)
            .map_err(ComputeError::QueueCreation)?;
        debug!("In-order queue created");
        Ok(Self { queue, context })
    }

    pub fn context(&self) -> &A::Context {
        &self.context
    }

    pub fn queue(&self) -> &A::Queue {
        &self.queue
    }

    /// Block until every enqueued command has completed.
    pub fn finish(&self, api: &A) -> ComputeResult<()> {
        api.finish(&self.queue).map_err(|source| ComputeError::Dispatch {
            phase: DispatchPhase::Finish,
            source,
        })
    }
}
