use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::broadcast::{self, Receiver};
use tokio::{signal, time};

use futures::future;
use futures::stream::{FuturesUnordered, StreamExt};

use hyper::server::conn::Http;
use hyper::service::Service;
use hyper::{Body, Request, Response};

use log::{debug, info, warn};

mod endpoint;
mod journal;

pub use endpoint::handle;
pub use journal::DEFAULT_CAPACITY as DEFAULT_JOURNAL_CAPACITY;
pub use journal::{BoxError, Journal, JournalService, JournalSummary, Record};

use crate::config::DEFAULT_MAX_CONNECTIONS;

/// Local stand-in for the messaging endpoint.
pub struct Server<S> {
    listener: TcpListener,
    max_connections: usize,
    http: Http,
    service: S,
    journal: Journal,
}

pub struct Builder {
    listener: TcpListener,
    max_connections: usize,
    journal_capacity: usize,
    http: Http,
}

impl Builder {
    pub fn max_connections(mut self, num: usize) -> Self {
        self.max_connections = num;
        self
    }

    /// Number of most recent requests kept in full by the journal.
    pub fn journal_capacity(mut self, num: usize) -> Self {
        self.journal_capacity = num;
        self
    }

    pub fn keep_alive(mut self, val: bool) -> Self {
        self.http.http1_keep_alive(val);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service<S>(self, service: S) -> Server<S> {
        Server {
            listener: self.listener,
            max_connections: self.max_connections,
            http: self.http,
            service,
            journal: Journal::with_capacity(self.journal_capacity),
        }
    }
}

impl Server<()> {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Builder> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Builder {
            listener,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            http: Http::new(),
        })
    }
}

impl<S> Server<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    const DEFAULT_SHUTDOWN_DELAY: Duration = Duration::from_secs(5);

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle on the requests this server records; stays readable after `run`.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    async fn process_stream(
        stream: TcpStream,
        http: Http,
        service: JournalService<S>,
        mut shutdown: Receiver<()>,
    ) {
        let connection = http.serve_connection(stream, service);

        let shutdown_signal = shutdown.recv();

        tokio::pin!(connection);

        let result = tokio::select! {
            r = connection.as_mut() => r,
            _ = shutdown_signal => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        };

        if let Err(e) = result {
            debug!("Connection closed with error: {}", e);
        }
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Can't listen for Ctrl-C: {}", e);
                future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `signal` completes, then shuts every connection down.
    pub async fn run_until<F: Future<Output = ()>>(self, signal: F) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Receiving messages on {}", addr);
        }

        let mut jhs = FuturesUnordered::new();
        let mut next_connection: usize = 0;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        drop(shutdown_rx);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                Ok((stream, peer)) = self.listener.accept(), if jhs.len() < self.max_connections => {
                    next_connection += 1;
                    debug!("Connection {} from {}", next_connection, peer);
                    let service = JournalService::new(
                        self.service.clone(),
                        self.journal.clone(),
                        next_connection,
                    );
                    jhs.push(tokio::spawn(Self::process_stream(
                        stream,
                        self.http.clone(),
                        service,
                        shutdown_tx.subscribe(),
                    )));
                },
                _ = jhs.next(), if !jhs.is_empty() => {},
                _ = &mut signal => break,
            }
        }

        drop(self.listener);

        if shutdown_tx.send(()).is_ok() {
            let _ = time::timeout(Self::DEFAULT_SHUTDOWN_DELAY, future::join_all(jhs)).await;
        }

        log_summary(&self.journal.summary());
    }
}

fn log_summary(summary: &JournalSummary) {
    info!(
        "Receiver stopped: {} connection(s), {} request(s); \
        handling min {} ms, avg {} ms, max {} ms",
        summary.connections,
        summary.requests,
        summary.min_handling.as_millis(),
        summary.avg_handling.as_millis(),
        summary.max_handling.as_millis()
    );
}
