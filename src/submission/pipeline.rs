use std::collections::BTreeMap;
use std::time::Instant;
use tokio::time::timeout;

use super::context::SubmissionContext;
use super::observers;
use super::traits::{Observer, ObserverRing};
use super::SubmitError;

/// Runs registered observers ring by ring, stopping at the first failing pre-commit ring
pub struct SubmissionPipeline {
    observers: BTreeMap<ObserverRing, Vec<Box<dyn Observer>>>,
}

impl SubmissionPipeline {
    pub fn new() -> Self {
        Self {
            observers: BTreeMap::new(),
        }
    }

    /// Pipeline with the built-in observers for submit, approve and reject
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(observers::DataPreparationObserver));
        pipeline.register(Box::new(observers::AccessObserver));
        pipeline.register(Box::new(observers::TransitionObserver));
        pipeline.register(Box::new(observers::SchemaValidationObserver));
        pipeline.register(Box::new(observers::RecordBuilderObserver));
        pipeline.register(Box::new(observers::FormWriterObserver));
        pipeline.register(Box::new(observers::StatusNotificationObserver));
        pipeline
    }

    pub fn register(&mut self, observer: Box<dyn Observer>) {
        let ring = observer.ring();
        let name = observer.name();
        let ring_observers = self.observers.entry(ring).or_default();
        ring_observers.push(observer);
        ring_observers.sort_by_key(|o| o.priority());

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub async fn execute(&self, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        tracing::debug!("Submission pipeline starting: operation={}", ctx.kind());

        for ring in ObserverRing::ORDER {
            if ctx.cancel.is_cancelled() {
                tracing::debug!("Submission cancelled before ring {:?}", ring);
                return Err(SubmitError::Cancelled);
            }
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, ctx).await?;
        }

        tracing::debug!("Submission pipeline finished in {:?}", ctx.start_time.elapsed());
        Ok(())
    }

    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut SubmissionContext) -> Result<(), SubmitError> {
        let Some(observers) = self.observers.get(&ring) else {
            return Ok(());
        };

        for observer in observers {
            if !observer.applies_to(ctx.kind()) {
                tracing::trace!("Observer {} skipped for {}", observer.name(), ctx.kind());
                continue;
            }

            let observer_start = Instant::now();
            let outcome = match timeout(observer.timeout(), observer.execute(ctx)).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    tracing::error!("Observer {} timed out after {:?}", observer.name(), observer.timeout());
                    Err(SubmitError::Timeout(observer.name()))
                }
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!("Observer {} completed in {:?}", observer.name(), observer_start.elapsed());
                }
                Err(error) if ring.is_post_commit() => {
                    tracing::warn!("Observer {} failed after commit: {}", observer.name(), error);
                    ctx.warnings.push(format!("{}: {}", observer.name(), error));
                }
                Err(error) => {
                    tracing::debug!("Observer {} stopped the pipeline: {}", observer.name(), error);
                    return Err(error);
                }
            }
        }

        Ok(())
    }
}

impl Default for SubmissionPipeline {
    fn default() -> Self {
        Self::standard()
    }
}
