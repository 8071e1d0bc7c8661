//! Ordered processor chains.
//!
//! A chain runs its processors strictly in declared order against a single
//! execution context and stops as soon as the context reports an
//! interruption. Hooks observe each step (tracing, metrics) without changing
//! ordering or short-circuit behavior.

use crate::context::ExecutionContext;
use crate::error::{GatewayError, GatewayResult};
use crate::failure::ExecutionFailure;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// A single step of a processor chain
#[async_trait]
pub trait Processor: Send + Sync {
    /// Processor identifier, used in logs and hooks
    fn id(&self) -> &str;

    /// Execute against the context.
    ///
    /// Business outcomes (auth refused, no endpoint, ...) should interrupt the
    /// context. An `Err` is reserved for faults and is converted by the chain
    /// into an interruption with a 500 failure.
    async fn execute(&self, ctx: &mut ExecutionContext) -> GatewayResult<()>;
}

/// Creates a processor for a chain; `None` means "not applicable here"
pub trait ProcessorFactory: Send + Sync {
    /// Create the processor, if any
    fn create(&self) -> Option<Arc<dyn Processor>>;
}

impl<F> ProcessorFactory for F
where
    F: Fn() -> Option<Arc<dyn Processor>> + Send + Sync,
{
    fn create(&self) -> Option<Arc<dyn Processor>> {
        self()
    }
}

/// Observer wrapped around every processor execution
pub trait ProcessorHook: Send + Sync {
    /// Hook identifier
    fn id(&self) -> &str;

    /// Called before a processor runs
    fn pre(&self, _chain_id: &str, _processor_id: &str, _ctx: &ExecutionContext) {}

    /// Called after a processor completed without error
    fn post(&self, _chain_id: &str, _processor_id: &str, _ctx: &ExecutionContext) {}

    /// Called when a processor returned an error
    fn error(
        &self,
        _chain_id: &str,
        _processor_id: &str,
        _ctx: &ExecutionContext,
        _error: &GatewayError,
    ) {
    }

    /// Called when the chain stops because the context was interrupted
    fn interrupted(&self, _chain_id: &str, _processor_id: &str, _ctx: &ExecutionContext) {}
}

/// Result of running a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every processor ran
    Completed,
    /// The context was interrupted; remaining processors were skipped
    Interrupted,
}

/// An ordered sequence of processors
#[derive(Clone)]
pub struct ProcessorChain {
    id: String,
    processors: Vec<Arc<dyn Processor>>,
    hooks: Vec<Arc<dyn ProcessorHook>>,
}

impl ProcessorChain {
    /// Create a chain from processors, in execution order
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        processors: impl IntoIterator<Item = Arc<dyn Processor>>,
    ) -> Self {
        Self {
            id: id.into(),
            processors: processors.into_iter().collect(),
            hooks: Vec::new(),
        }
    }

    /// Create a chain from factories, silently skipping those producing nothing
    #[must_use]
    pub fn from_factories(id: impl Into<String>, factories: &[Box<dyn ProcessorFactory>]) -> Self {
        Self::new(id, factories.iter().filter_map(|factory| factory.create()))
    }

    /// Attach hooks, run in the given order around each processor
    pub fn add_hooks(&mut self, hooks: impl IntoIterator<Item = Arc<dyn ProcessorHook>>) {
        self.hooks.extend(hooks);
    }

    /// Builder variant of `add_hooks`
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn ProcessorHook>>) -> Self {
        self.add_hooks(hooks);
        self
    }

    /// Chain identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of processors
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain has no processors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Identifiers of the processors, in order
    pub fn processor_ids(&self) -> impl Iterator<Item = &str> {
        self.processors.iter().map(|p| p.id())
    }

    /// Run the chain against a context
    pub async fn execute(&self, ctx: &mut ExecutionContext) -> ChainOutcome {
        if ctx.is_interrupted() {
            debug!(chain = %self.id, "Context already interrupted, skipping chain");
            return ChainOutcome::Interrupted;
        }

        for processor in &self.processors {
            let processor_id = processor.id();

            for hook in &self.hooks {
                hook.pre(&self.id, processor_id, ctx);
            }

            let span = info_span!("processor", chain = %self.id, processor = %processor_id);
            match processor.execute(ctx).instrument(span).await {
                Ok(()) => {
                    for hook in &self.hooks {
                        hook.post(&self.id, processor_id, ctx);
                    }
                }
                Err(error) => {
                    warn!(
                        chain = %self.id,
                        processor = %processor_id,
                        error = %error,
                        "Processor failed"
                    );
                    for hook in &self.hooks {
                        hook.error(&self.id, processor_id, ctx, &error);
                    }
                    ctx.interrupt_with(ExecutionFailure::from(&error));
                }
            }

            if ctx.is_interrupted() {
                debug!(chain = %self.id, processor = %processor_id, "Chain interrupted");
                for hook in &self.hooks {
                    hook.interrupted(&self.id, processor_id, ctx);
                }
                return ChainOutcome::Interrupted;
            }
        }

        ChainOutcome::Completed
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("id", &self.id)
            .field("processors", &self.processor_ids().collect::<Vec<_>>())
            .field("hooks", &self.hooks.iter().map(|h| h.id()).collect::<Vec<_>>())
            .finish()
    }
}
