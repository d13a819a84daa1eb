//! The connection factory.
//!
//! [`connect`] turns a [`ClientConfig`] into a [`ClientConn`]: it resolves the
//! address, installs the transport logger, builds the timing and retry
//! policies, assembles the interceptor chain and sets up the transport for
//! the first resolved host.

use std::fmt;
use std::sync::Arc;

use crate::address::{ResolvedAddress, resolve};
use crate::client::{ClientConn, wire_call};
use crate::config::{ClientConfig, ConnectionTimingPolicy, RetryPolicy};
use crate::interceptor::{
    GlobalMetrics, Interceptor, InterceptorChain, LoggingInterceptor, MetricsInterceptor,
    MetricsRecorder, RetryInterceptor, Tracer, TracingInterceptor, TracingTracer,
};
use crate::logger::{self, Field, LoggerBridge, Severity, StructuredLogger, TracingLogger};
use crate::transport::HyperTransport;
use crate::ConnectError;

/// Overrides for [`connect_with_options`].
///
/// Every setting has a default: the `tracing`-backed logger and tracer, the
/// global `metrics` recorder, [`ConnectionTimingPolicy::default`] and
/// [`RetryPolicy::default`].
#[derive(Clone, Default)]
pub struct ClientOptions {
    logger: Option<Arc<dyn StructuredLogger>>,
    tracer: Option<Arc<dyn Tracer>>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
    timing: ConnectionTimingPolicy,
    retry: RetryPolicy,
    extra: Vec<Arc<dyn Interceptor>>,
    block: bool,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timing", &self.timing)
            .field("retry", &self.retry)
            .field("extra", &self.extra.iter().map(|i| i.name()).collect::<Vec<_>>())
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Application logger. Receives the factory's own entries and, through
    /// the installed [`LoggerBridge`], the transport's diagnostics.
    pub fn logger(mut self, logger: Arc<dyn StructuredLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn metrics(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(recorder);
        self
    }

    pub fn timing(mut self, timing: ConnectionTimingPolicy) -> Self {
        self.timing = timing;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Append an interceptor below the built-in logging layer.
    ///
    /// Extra interceptors run once per attempt, in the order added.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.extra.push(Arc::new(interceptor));
        self
    }

    /// Wait for the first successful handshake before returning.
    pub fn block(mut self) -> Self {
        self.block = true;
        self
    }

    /// Tracing, retry, metrics, logging, then any extra interceptors.
    pub(crate) fn assemble_chain(&self) -> InterceptorChain {
        let tracer = self
            .tracer
            .clone()
            .unwrap_or_else(|| Arc::new(TracingTracer));
        let metrics = self.metrics.clone().unwrap_or_else(|| {
            GlobalMetrics::describe();
            Arc::new(GlobalMetrics)
        });

        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(TracingInterceptor::new(tracer)));
        chain.push(Arc::new(RetryInterceptor::new(Arc::new(self.retry.clone()))));
        chain.push(Arc::new(MetricsInterceptor::new(metrics)));
        chain.push(Arc::new(LoggingInterceptor));
        for extra in &self.extra {
            chain.push(extra.clone());
        }
        chain
    }
}

/// Dial with default options.
pub async fn connect(config: &ClientConfig) -> Result<ClientConn, ConnectError> {
    connect_with_options(config, ClientOptions::default()).await
}

/// Dial `config.address`.
///
/// Only the first resolved host is dialed. Unless [`ClientOptions::block`]
/// is set this returns once the transport is built, and the first
/// handshake happens on the first call.
///
/// A failure is logged once at error severity before it is returned.
pub async fn connect_with_options(
    config: &ClientConfig,
    options: ClientOptions,
) -> Result<ClientConn, ConnectError> {
    let logger = options
        .logger
        .clone()
        .unwrap_or_else(|| Arc::new(TracingLogger));

    logger.log(
        Severity::Info,
        "connecting to grpc server",
        &[Field::new("address", &config.address)],
    );

    match dial(config, options, logger.clone()).await {
        Ok(conn) => Ok(conn),
        Err(err) => {
            logger.log(
                Severity::Error,
                "failed to connect to grpc server",
                &[
                    Field::new("address", &config.address),
                    Field::new("error", &err),
                ],
            );
            Err(err)
        }
    }
}

async fn dial(
    config: &ClientConfig,
    options: ClientOptions,
    logger: Arc<dyn StructuredLogger>,
) -> Result<ClientConn, ConnectError> {
    config.validate()?;
    let resolved = resolve(&config.address)?;

    logger::install(LoggerBridge::new(
        logger.clone(),
        config.log_level,
        config.log_verbosity,
    ));

    options
        .timing
        .validate()
        .map_err(|reason| ConnectError::InvalidConfig(reason.to_owned()))?;
    options
        .retry
        .validate()
        .map_err(|reason| ConnectError::InvalidConfig(reason.to_owned()))?;

    let chain = options.assemble_chain();

    let target = resolved.first().to_owned();
    let endpoint = ResolvedAddress::endpoint_uri(&target)?;
    let transport = HyperTransport::builder(options.timing).build();

    if options.block {
        transport
            .probe(endpoint.clone())
            .await
            .map_err(|err| ConnectError::dial(&target, err))?;
    }

    let call = chain.wrap_unary(wire_call(transport, endpoint));
    Ok(ClientConn::new(target, resolved, call, chain.names(), logger))
}
