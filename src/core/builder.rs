use std::marker::PhantomData;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::{
    connection::Connection,
    dispatcher::{Dispatcher, Shared},
    limiter::SlotLimiter,
    main_thread::MainThread,
    workers::{Prepare, Workers},
};
use crate::{
    config::DispatchConfig,
    error::BuildError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Dispatcher`] with optional features.
pub struct DispatcherBuilder<C: Connection> {
    cfg: DispatchConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime: Option<Handle>,
    _conn: PhantomData<fn() -> C>,
}

impl<C: Connection> DispatcherBuilder<C> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DispatchConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            runtime: None,
            _conn: PhantomData,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runs builds, timers and callbacks on `runtime` instead of the current one.
    ///
    /// Needed when the dispatcher is built from a thread that is not inside a
    /// runtime, such as the authoritative thread itself.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the dispatcher.
    ///
    /// - `prepare`: the payload build routine
    /// - `main_thread`: the authoritative queue that delivery and fallback run on
    pub fn build<P>(
        self,
        prepare: P,
        main_thread: Arc<dyn MainThread>,
    ) -> Result<Dispatcher<C>, BuildError>
    where
        P: Prepare<C>,
    {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();
        let (config_tx, config_rx) = watch::channel(self.cfg);

        if !self.subscribers.is_empty() {
            let _guard = runtime.enter();
            let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
            subscriber_listener(&runtime, &bus, subs, runtime_token.clone());
        }

        let workers = Workers::new(runtime, Arc::new(prepare), runtime_token.clone());
        let shared = Arc::new(Shared {
            config: config_rx,
            global: SlotLimiter::new(),
            workers,
            main_thread,
            bus,
        });

        Ok(Dispatcher::new_internal(shared, config_tx, runtime_token))
    }
}

/// Forwards bus events to the subscriber set until the dispatcher shuts down.
fn subscriber_listener(
    runtime: &Handle,
    bus: &Bus,
    subs: Arc<SubscriberSet>,
    token: CancellationToken,
) {
    let mut rx = bus.subscribe();
    runtime.spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });
}
