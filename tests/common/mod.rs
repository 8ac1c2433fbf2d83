#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use hyper::service::{service_fn, Service};
use hyper::{Body, Request, Response, StatusCode, Uri};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use sendloop::receiver::{self, BoxError, Builder, Journal, Server};
use sendloop::{Config, FailurePolicy, Payload};

pub struct Running {
    pub addr: SocketAddr,
    pub journal: Journal,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Running {
    pub fn uri(&self, path: &str) -> Uri {
        format!("http://{}{}", self.addr, path).parse().unwrap()
    }

    pub async fn stop(self) -> Journal {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap();
        self.journal
    }
}

pub async fn bind() -> Builder {
    Server::bind("127.0.0.1:0").await.unwrap()
}

pub async fn start<S>(service: S) -> Running
where
    S: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    serve(bind().await, service)
}

/// Runs the messaging endpoint on `builder`.
pub fn serve_endpoint(builder: Builder) -> Running {
    serve(builder, service_fn(|req| receiver::handle(req, Duration::ZERO)))
}

pub async fn start_endpoint() -> Running {
    serve_endpoint(bind().await)
}

pub fn serve<S>(builder: Builder, service: S) -> Running
where
    S: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    let server = builder.service(service);
    let addr = server.local_addr().unwrap();
    let journal = server.journal();

    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    Running {
        addr,
        journal,
        shutdown,
        handle,
    }
}

pub async fn start_with_status(status: StatusCode) -> Running {
    start(service_fn(move |_req: Request<Body>| async move {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        Ok::<_, Infallible>(response)
    }))
    .await
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Answers exactly one request with 200, then closes the connection and
/// stops listening.
pub async fn answer_once() -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drop(listener);

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }

        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        let _ = stream.shutdown().await;
        request
    });

    (addr, handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(end) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    request.len() >= end + 4 + length
}

pub fn config(addr: SocketAddr, count: usize, delay: Duration) -> Config {
    Config {
        endpoint: format!("http://{}/message/send", addr).parse().unwrap(),
        message_count: count,
        delay,
        payload: Payload::new("910000000000@s.whatsapp.net", "Hello from sendloop"),
        on_failure: FailurePolicy::Abort,
    }
}

pub fn lines(out: &[u8]) -> Vec<String> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
