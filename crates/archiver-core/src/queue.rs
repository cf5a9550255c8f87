//! # Job Queue Interface
//!
//! The consumer-side contract for the external job queue: pop a job, then
//! ack or nack it once the executor has decided its outcome. The producer
//! and broker themselves are external collaborators this crate never
//! implements.

use async_trait::async_trait;

use crate::model::Job;

/// A handle to a popped job, used to acknowledge or reject it once
/// processing has finished.
pub struct Delivery {
    /// The job payload.
    pub job: Job,
    /// An opaque token the queue backend uses to identify this delivery for
    /// ack/nack.
    pub token: Vec<u8>,
}

/// The consumer side of the external job queue.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Pop the next available job, or `None` if the queue is empty.
    async fn pop(&self) -> Result<Option<Delivery>, String>;

    /// Acknowledge successful processing of a delivery.
    async fn ack(&self, delivery: Delivery) -> Result<(), String>;

    /// Reject a delivery, typically requeuing it for a later retry.
    async fn nack(&self, delivery: Delivery) -> Result<(), String>;
}
