use std::io::Write;
use std::time::{Duration, Instant};

use hyper::body::{Body, Bytes};
use hyper::client::connect::HttpConnector;
use hyper::client::Client;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode};

use log::{debug, error, info, warn};

use tokio::time;

use crate::config::{Config, FailurePolicy};
use crate::error::SendError;

/// What came back for one request.
#[derive(Debug)]
pub enum Outcome {
    /// The endpoint answered, whatever the status.
    Status(StatusCode),
    /// No response: refused, unresolvable, reset, timed out.
    Failed(hyper::Error),
}

#[derive(Debug)]
pub struct Attempt {
    /// 1-based position in the run.
    pub index: usize,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Send(usize),
    Wait,
}

/// Schedule of a run: `count` sends with a wait between each pair.
pub struct Plan {
    next: usize,
    count: usize,
    wait_due: bool,
}

pub fn plan(count: usize) -> Plan {
    Plan {
        next: 1,
        count,
        wait_due: false,
    }
}

impl Iterator for Plan {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.next > self.count {
            return None;
        }
        if self.wait_due {
            self.wait_due = false;
            return Some(Step::Wait);
        }

        let index = self.next;
        self.next += 1;
        self.wait_due = self.next <= self.count;
        Some(Step::Send(index))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub attempted: usize,
    /// Requests that got a response, any status.
    pub answered: usize,
    /// Responses with a 2xx status.
    pub successful: usize,
    pub failed: usize,
    pub min_round_trip: Duration,
    pub avg_round_trip: Duration,
    pub max_round_trip: Duration,
    pub total_duration: Duration,
}

#[derive(Default)]
struct Tally {
    round_trips: Vec<Duration>,
    successful: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, attempt: &Attempt) {
        match &attempt.outcome {
            Outcome::Status(status) => {
                self.round_trips.push(attempt.elapsed);
                if status.is_success() {
                    self.successful += 1;
                }
            }
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    fn answered(&self) -> usize {
        self.round_trips.len()
    }

    fn finish(self, total_duration: Duration) -> Summary {
        let answered = self.round_trips.len();
        let sum = self.round_trips.iter().sum::<Duration>();

        Summary {
            attempted: answered + self.failed,
            answered,
            successful: self.successful,
            failed: self.failed,
            min_round_trip: self.round_trips.iter().min().copied().unwrap_or_default(),
            avg_round_trip: sum.checked_div(answered as u32).unwrap_or_default(),
            max_round_trip: self.round_trips.iter().max().copied().unwrap_or_default(),
            total_duration,
        }
    }
}

/// Posts the configured payload to the endpoint, one request at a time.
pub struct Sender {
    client: Client<HttpConnector>,
    config: Config,
    body: Bytes,
}

impl Sender {
    pub fn new(config: Config) -> Self {
        let body = config.payload.encode();
        Self {
            client: Client::new(),
            config,
            body,
        }
    }

    /// Performs a single request. Only a malformed request is an `Err`;
    /// transport failures are reported in the returned `Attempt`.
    pub async fn send(&self, index: usize) -> Result<Attempt, SendError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.config.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(self.body.clone()))?;

        let timei = Instant::now();
        let outcome = match self.client.request(request).await {
            Ok(response) => {
                let status = response.status();
                // Drained so the pooled connection can carry the next message.
                if let Err(e) = hyper::body::to_bytes(response.into_body()).await {
                    debug!("Response body of message {} cut short: {}", index, e);
                }
                Outcome::Status(status)
            }
            Err(e) => Outcome::Failed(e),
        };
        let elapsed = timei.elapsed();

        debug!("Message {} round trip {} ms", index, elapsed.as_millis());

        Ok(Attempt {
            index,
            elapsed,
            outcome,
        })
    }

    /// Sends `message_count` messages, writing one line per message to `out`.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<Summary, SendError> {
        info!(
            "Sending {} message(s) to {} every {} ms",
            self.config.message_count,
            self.config.endpoint,
            self.config.delay.as_millis()
        );

        let timei = Instant::now();
        let mut tally = Tally::default();

        for step in plan(self.config.message_count) {
            let index = match step {
                Step::Wait => {
                    time::sleep(self.config.delay).await;
                    continue;
                }
                Step::Send(index) => index,
            };

            let attempt = self.send(index).await?;
            tally.record(&attempt);

            match attempt.outcome {
                Outcome::Status(status) => {
                    writeln!(out, "Sent message {}: {}", index, status.as_u16())?;
                }
                Outcome::Failed(e) => match self.config.on_failure {
                    FailurePolicy::Abort => {
                        let sent = tally.answered();
                        error!("Message {} failed, {} sent before it: {}", index, sent, e);
                        return Err(SendError::Transport {
                            index,
                            sent,
                            source: e,
                        });
                    }
                    FailurePolicy::Continue => {
                        warn!("Message {} failed: {}", index, e);
                        writeln!(out, "Sent message {}: failed ({})", index, e)?;
                    }
                },
            }
            out.flush()?;
        }

        let summary = tally.finish(timei.elapsed());
        log_summary(&summary);
        Ok(summary)
    }
}

fn log_summary(summary: &Summary) {
    info!(
        "Run finished: {} attempted, {} answered ({} with 2xx), {} failed; \
        round trip min {} ms, avg {} ms, max {} ms; total {} ms",
        summary.attempted,
        summary.answered,
        summary.successful,
        summary.failed,
        summary.min_round_trip.as_millis(),
        summary.avg_round_trip.as_millis(),
        summary.max_round_trip.as_millis(),
        summary.total_duration.as_millis()
    );
}
