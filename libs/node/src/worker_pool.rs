//! Asynchronous replier
//!
//! A broker task sits between the public frontend socket and a private
//! in-process backend that the workers connect to. Each worker announces
//! itself with [`READY`] once and then again implicitly with every reply it
//! sends back, so the broker always knows which workers are idle:
//!
//! ```text
//! callers -> frontend (router) -> broker -> backend (router) -> workers (dealers)
//! ```
//!
//! The frontend is only read while some worker is idle. Requests beyond
//! that wait in the frontend's bounded queue and, once it is full, in the
//! callers' own sends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use constellation_fabric::{DealerSocket, Endpoint, Envelope, Multipart, RouterSocket};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::{ExtensionConfig, ServiceConfig, WorkerPoolConfig};
use crate::error::{Error, Result};
use crate::extension::{self, Extension};
use crate::lifecycle::{CloseHandle, Service};
use crate::registry::{CommandRegistry, Dispatcher};
use crate::serve;
use crate::trace::Stamp;

/// Signal a worker sends when it joins the pool
pub const READY: &[u8] = b"READY";

static NEXT_BACKEND: AtomicU64 = AtomicU64::new(0);

/// Server that hands requests to a pool of workers
pub struct AsyncReplier {
    name: String,
    frontend: RouterSocket,
    backend: RouterSocket,
    workers: Vec<Worker>,
    close: CloseHandle,
}

impl AsyncReplier {
    pub async fn bind(
        config: ServiceConfig,
        mut registry: CommandRegistry,
        extensions: Vec<ExtensionConfig>,
        pool: WorkerPoolConfig,
    ) -> Result<Self> {
        config.validate()?;
        let dispatcher = registry.resolve(&extension::names(&extensions))?;

        let frontend =
            RouterSocket::bind_with_capacity(&config.endpoint, pool.high_water_mark).await?;
        let stamp = config.stamp(frontend.local_endpoint());

        let backend_endpoint = Endpoint::inproc(format!(
            "{}.workers.{}",
            config.name,
            NEXT_BACKEND.fetch_add(1, Ordering::Relaxed)
        ));
        let backend = RouterSocket::bind(&backend_endpoint).await?;

        let count = pool.worker_count();
        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            workers.push(Worker {
                id,
                dealer: DealerSocket::connect(backend.local_endpoint()).await?,
                dispatcher: dispatcher.clone(),
                extensions: extension::from_configs(&extensions),
                stamp: stamp.clone(),
            });
        }

        info!(
            service = %config.name,
            endpoint = %frontend.local_endpoint(),
            workers = count,
            "async replier bound"
        );

        Ok(Self {
            name: config.name,
            frontend,
            backend,
            workers,
            close: CloseHandle::new(),
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        self.frontend.local_endpoint()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// A worker finished a job or just joined; `message` is
    /// `[worker, "", READY]` or `[worker, "", client.., "", reply]`
    async fn on_backend(&mut self, message: Multipart, ready: &mut VecDeque<Vec<u8>>) -> Result<()> {
        let (envelope, body) = Envelope::split(message);
        let Some(worker) = envelope.identity() else {
            return Err(Error::Custom("backend message without worker identity".to_string()));
        };
        ready.push_back(worker.to_vec());

        if body.len() == 1 && body[0] == READY {
            return Ok(());
        }
        self.frontend.send(body).await?;
        Ok(())
    }

    /// `message` is `[client, "", payload]`
    async fn on_frontend(&mut self, message: Multipart, ready: &mut VecDeque<Vec<u8>>) -> Result<()> {
        let Some(worker) = ready.pop_front() else {
            return Err(Error::Custom("frontend read with no idle worker".to_string()));
        };
        self.backend.send(Envelope::new(vec![worker]).wrap(message)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Service for AsyncReplier {
    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    async fn run(mut self) -> Result<()> {
        let mut closed = self.close.signal();
        let mut tasks = JoinSet::new();
        for worker in self.workers.drain(..) {
            tasks.spawn(worker.run());
        }

        let mut ready: VecDeque<Vec<u8>> = VecDeque::with_capacity(tasks.len());

        let result = loop {
            tokio::select! {
                _ = closed.closed() => break Ok(()),
                message = self.backend.recv() => {
                    let outcome = match message {
                        Ok(message) => self.on_backend(message, &mut ready).await,
                        Err(error) => Err(error.into()),
                    };
                    if let Err(error) = outcome {
                        break Err(error);
                    }
                }
                message = self.frontend.recv(), if !ready.is_empty() => {
                    let outcome = match message {
                        Ok(message) => self.on_frontend(message, &mut ready).await,
                        Err(error) => Err(error.into()),
                    };
                    if let Err(error) = outcome {
                        break Err(error);
                    }
                }
                Some(joined) = tasks.join_next() => {
                    let error = match joined {
                        Ok(Ok(())) => Error::Custom("worker stopped".to_string()),
                        Ok(Err(error)) => error,
                        Err(join) => Error::Custom(format!("worker panicked: {join}")),
                    };
                    error!(service = %self.name, %error, "worker failed");
                    break Err(error);
                }
            }
        };

        debug!(service = %self.name, "async replier closing");
        tasks.shutdown().await;
        self.frontend.close().await?;
        self.backend.close().await?;
        result
    }
}

struct Worker {
    id: usize,
    dealer: DealerSocket,
    dispatcher: Dispatcher,
    extensions: Vec<Extension>,
    stamp: Stamp,
}

impl Worker {
    async fn run(mut self) -> Result<()> {
        self.dealer.send(&[Vec::new(), READY.to_vec()]).await?;
        debug!(worker = self.id, "worker ready");

        loop {
            // ["", client.., "", payload]
            let (_, job) = Envelope::split(self.dealer.recv().await?);
            let (envelope, body) = Envelope::split(job);

            let reply =
                serve::answer(&body, &self.dispatcher, &mut self.extensions, &self.stamp).await;

            let mut message = vec![Vec::new()];
            message.extend(envelope.wrap([reply]));
            self.dealer.send(&message).await?;
        }
    }
}
