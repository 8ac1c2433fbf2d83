use std::cmp;
use std::collections::VecDeque;
use std::error::Error;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::service::Service;
use hyper::{Body, Method, Request, Response, StatusCode};

use parking_lot::Mutex;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// One request as the endpoint saw it.
#[derive(Debug, Clone)]
pub struct Record {
    pub connection: usize,
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub status: StatusCode,
    pub handling: Duration,
}

/// Most recent records kept by a `Journal` unless told otherwise.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Requests received so far, shared by every connection of a server.
///
/// Totals cover every request; only the latest `capacity` records are kept.
#[derive(Debug, Clone)]
pub struct Journal {
    entries: Arc<Mutex<Entries>>,
}

#[derive(Debug)]
struct Entries {
    records: VecDeque<Record>,
    capacity: usize,
    requests: usize,
    connections: usize,
    min_handling: Duration,
    max_handling: Duration,
    acc_handling: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalSummary {
    pub connections: usize,
    pub requests: usize,
    pub min_handling: Duration,
    pub avg_handling: Duration,
    pub max_handling: Duration,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let entries = Entries {
            records: VecDeque::with_capacity(cmp::min(capacity, DEFAULT_CAPACITY)),
            capacity,
            requests: 0,
            connections: 0,
            min_handling: Duration::MAX,
            max_handling: Duration::ZERO,
            acc_handling: Duration::ZERO,
        };
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    fn push(&self, record: Record, new_connection: bool) {
        let mut entries = self.entries.lock();

        entries.requests += 1;
        if new_connection {
            entries.connections += 1;
        }
        entries.min_handling = cmp::min(record.handling, entries.min_handling);
        entries.max_handling = cmp::max(record.handling, entries.max_handling);
        entries.acc_handling += record.handling;

        if entries.capacity == 0 {
            return;
        }
        if entries.records.len() == entries.capacity {
            entries.records.pop_front();
        }
        entries.records.push_back(record);
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<Record> {
        self.entries.lock().records.iter().cloned().collect()
    }

    /// Number of requests recorded, retained or not.
    pub fn len(&self) -> usize {
        self.entries.lock().requests
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> JournalSummary {
        let entries = self.entries.lock();
        if entries.requests == 0 {
            return JournalSummary::default();
        }

        JournalSummary {
            connections: entries.connections,
            requests: entries.requests,
            min_handling: entries.min_handling,
            avg_handling: entries.acc_handling / (entries.requests as u32),
            max_handling: entries.max_handling,
        }
    }
}

/// Records every request into a `Journal` before handing it to `inner`.
#[derive(Clone)]
pub struct JournalService<T> {
    inner: T,
    journal: Journal,
    connection: usize,
    seen: Arc<AtomicBool>,
}

impl<T> JournalService<T> {
    pub fn new(inner: T, journal: Journal, connection: usize) -> Self {
        Self {
            inner,
            journal,
            connection,
            seen: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<T> Service<Request<Body>> for JournalService<T>
where
    T: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    T::Future: Send + 'static,
    T::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Keep the instance that was polled ready.
        let clone = self.inner.clone();
        let mut inner = mem::replace(&mut self.inner, clone);
        let journal = self.journal.clone();
        let connection = self.connection;
        let seen = Arc::clone(&self.seen);

        let f = async move {
            let timei = Instant::now();
            let (parts, body) = req.into_parts();
            let body = hyper::body::to_bytes(body).await?;

            let method = parts.method.clone();
            let path = parts.uri.path().to_string();
            let content_type = parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let request = Request::from_parts(parts, Body::from(body.clone()));
            let response = match inner.call(request).await {
                Ok(response) => response,
                Err(e) => return Err(e.into()),
            };

            let record = Record {
                connection,
                method,
                path,
                content_type,
                body,
                status: response.status(),
                handling: timei.elapsed(),
            };
            journal.push(record, !seen.swap(true, Ordering::Relaxed));

            Ok::<_, BoxError>(response)
        };

        Box::pin(f)
    }
}
