//! Bounded-concurrency fan-out of chunk uploads.
//!
//! Chunks arrive in production order and are assigned part numbers 1, 2, 3, …
//! as they are submitted. At most `jobs` uploads are in flight at once,
//! enforced by a semaphore. Completions are consumed in arrival order, which
//! is unordered with respect to submission. The first failed part sets a
//! cooperative cancellation flag that is checked before submitting every new
//! job; already-dispatched jobs drain naturally and their results are ignored
//! once the failure decision is made.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::domo::DomoClient;
use crate::error::AppError;
use crate::pipeline::uploader::{self, PartResult, UploadJob};

// ─────────────────────────────────────────────────────────────────────────────
// RunningAverage
// ─────────────────────────────────────────────────────────────────────────────

/// Running average over successful part durations.
///
/// Update rule: the first sample becomes the average; every later sample
/// halves the distance (`avg = (avg + sample) / 2`). Progress reporting only,
/// not a correctness-critical value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunningAverage(Option<Duration>);

impl RunningAverage {
    /// Folds one sample into the average.
    pub fn update(&mut self, sample: Duration) {
        self.0 = Some(match self.0 {
            None => sample,
            Some(avg) => (avg + sample) / 2,
        });
    }

    /// Current average, `None` until the first sample.
    pub fn get(&self) -> Option<Duration> {
        self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal outcome of one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every part uploaded successfully.
    Completed {
        /// Number of parts uploaded.
        parts: u64,
        /// Running average over part durations, `None` for a zero-part run.
        average: Option<Duration>,
    },
    /// A part exhausted its retries; no further chunks were submitted.
    PartFailed {
        /// First failed part observed in completion order.
        part_id: u64,
        /// Attempts that part made before giving up.
        attempts: u32,
    },
}

/// Runs the chunk stream through a fixed number of concurrent upload slots.
pub struct Dispatcher {
    client: DomoClient,
    stream_id: u64,
    jobs: usize,
    max_retries: u32,
}

impl Dispatcher {
    /// Creates a dispatcher with `jobs` concurrent upload slots.
    ///
    /// # Panics
    ///
    /// Panics if `jobs` is 0.
    pub fn new(client: DomoClient, stream_id: u64, jobs: usize, max_retries: u32) -> Self {
        assert!(jobs > 0, "jobs must be greater than 0");

        Self {
            client,
            stream_id,
            jobs,
            max_retries,
        }
    }

    /// Drains the chunk stream, uploading each chunk as the next part.
    ///
    /// Returns `Ok(DispatchOutcome)` for both full success and part failure;
    /// part failure is an outcome, not an error, so the coordinator can make
    /// the abort decision. Chunk encoding errors and task panics propagate as
    /// `Err`.
    pub async fn run(
        &self,
        execution_id: u64,
        mut chunks: mpsc::Receiver<Result<Vec<u8>, AppError>>,
    ) -> Result<DispatchOutcome, AppError> {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let failed = Arc::new(AtomicBool::new(false));
        let mut in_flight: JoinSet<PartResult> = JoinSet::new();
        let mut average = RunningAverage::default();
        let mut next_part: u64 = 1;
        let mut first_failure: Option<u64> = None;
        let mut parts_done: u64 = 0;
        let mut exhausted = false;

        loop {
            tokio::select! {
                chunk = chunks.recv(),
                    if !exhausted && first_failure.is_none() && !failed.load(Ordering::Acquire) =>
                {
                    match chunk {
                        Some(Ok(bytes)) => {
                            // The semaphore is never closed, so acquire only
                            // fails if the runtime is tearing down.
                            let permit = match semaphore.clone().acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => {
                                    return Err(AppError::Internal(
                                        "Upload slot semaphore closed".to_string(),
                                    ))
                                }
                            };

                            // A failure may have landed while waiting for a slot.
                            if failed.load(Ordering::Acquire) {
                                drop(permit);
                                continue;
                            }

                            let job = UploadJob {
                                stream_id: self.stream_id,
                                execution_id,
                                part_id: next_part,
                                chunk: Bytes::from(bytes),
                            };
                            next_part += 1;

                            let client = self.client.clone();
                            let flag = failed.clone();
                            let max_retries = self.max_retries;
                            in_flight.spawn(async move {
                                let result = uploader::upload_part(&client, job, max_retries).await;
                                if !result.success {
                                    flag.store(true, Ordering::Release);
                                }
                                drop(permit);
                                result
                            });
                        }
                        Some(Err(err)) => {
                            // Malformed input terminates the run; the caller's
                            // abort path takes over from here.
                            return Err(err);
                        }
                        None => exhausted = true,
                    }
                }
                joined = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Some(Ok(result)) => {
                            if first_failure.is_some() {
                                // Results arriving after the failure decision
                                // are ignored.
                                continue;
                            }
                            if !result.success {
                                warn!("Part {} failed, stopping submissions", result.part_id);
                                first_failure = Some(result.part_id);
                                continue;
                            }
                            parts_done += 1;
                            average.update(result.elapsed);
                            info!(
                                "Part {} completed in {:?} ({:?} average)",
                                result.part_id,
                                result.elapsed,
                                average.get().unwrap_or_default()
                            );
                        }
                        Some(Err(err)) => {
                            return Err(AppError::Internal(format!(
                                "Upload task panicked: {}",
                                err
                            )));
                        }
                        None => {}
                    }
                }
                else => break,
            }
        }

        match first_failure {
            Some(part_id) => Ok(DispatchOutcome::PartFailed {
                part_id,
                attempts: self.max_retries,
            }),
            None => Ok(DispatchOutcome::Completed {
                parts: parts_done,
                average: average.get(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use url::Url;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_dispatcher(server: &MockServer, jobs: usize, max_retries: u32) -> Dispatcher {
        let base_url = Url::parse(&server.uri()).unwrap();
        let client = DomoClient::new(
            Arc::new(reqwest::Client::new()),
            base_url,
            "test_token".to_string(),
        );
        Dispatcher::new(client, 42, jobs, max_retries)
    }

    /// Feeds the given chunks through a channel, then closes it.
    fn feed(chunks: Vec<Vec<u8>>) -> mpsc::Receiver<Result<Vec<u8>, AppError>> {
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    #[test]
    fn running_average_matches_update_rule() {
        let mut avg = RunningAverage::default();
        assert_eq!(avg.get(), None);

        avg.update(Duration::from_secs(4));
        assert_eq!(avg.get(), Some(Duration::from_secs(4)));

        avg.update(Duration::from_secs(2));
        assert_eq!(avg.get(), Some(Duration::from_secs(3)));

        avg.update(Duration::from_secs(1));
        assert_eq!(avg.get(), Some(Duration::from_secs(2)));
    }

    #[test]
    #[should_panic(expected = "jobs must be greater than 0")]
    fn zero_jobs_panics() {
        let client = DomoClient::new(
            Arc::new(reqwest::Client::new()),
            Url::parse("https://api.domo.com").unwrap(),
            "t".to_string(),
        );
        let _ = Dispatcher::new(client, 1, 0, 1);
    }

    #[tokio::test]
    async fn assigns_sequential_part_numbers_in_production_order() {
        let server = MockServer::start().await;
        let dispatcher = test_dispatcher(&server, 2, 1);

        for part in 1..=3 {
            Mock::given(method("PUT"))
                .and(path(format!("/v1/streams/42/executions/777/part/{}", part)))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        let rx = feed(vec![b"a\r\n".to_vec(), b"b\r\n".to_vec(), b"c\r\n".to_vec()]);
        let outcome = dispatcher.run(777, rx).await.unwrap();

        match outcome {
            DispatchOutcome::Completed { parts, average } => {
                assert_eq!(parts, 3);
                assert!(average.is_some());
            }
            other => panic!("Expected Completed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_part_produces_part_failed_outcome() {
        let server = MockServer::start().await;
        let dispatcher = test_dispatcher(&server, 2, 3);

        Mock::given(method("PUT"))
            .and(path("/v1/streams/42/executions/777/part/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/v1/streams/42/executions/777/part/2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let rx = feed(vec![b"a\r\n".to_vec(), b"b\r\n".to_vec()]);
        let outcome = dispatcher.run(777, rx).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::PartFailed {
                part_id: 2,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn stops_submitting_new_parts_after_failure() {
        let server = MockServer::start().await;
        // One slot: part 2 cannot be submitted until part 1 finishes, and by
        // then the failure flag is set.
        let dispatcher = test_dispatcher(&server, 1, 2);

        Mock::given(method("PUT"))
            .and(path("/v1/streams/42/executions/777/part/1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path_regex(r"^/v1/streams/42/executions/777/part/[2-9]$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let rx = feed(vec![
            b"a\r\n".to_vec(),
            b"b\r\n".to_vec(),
            b"c\r\n".to_vec(),
            b"d\r\n".to_vec(),
        ]);
        let outcome = dispatcher.run(777, rx).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::PartFailed {
                part_id: 1,
                attempts: 2
            }
        );
    }

    #[tokio::test]
    async fn chunker_error_propagates() {
        let server = MockServer::start().await;
        let dispatcher = test_dispatcher(&server, 2, 1);

        let (tx, rx) = mpsc::channel(2);
        tx.send(Err(AppError::CsvChunk("bad record".into())))
            .await
            .unwrap();
        drop(tx);

        match dispatcher.run(777, rx).await.unwrap_err() {
            AppError::CsvChunk(msg) => assert!(msg.contains("bad record")),
            e => panic!("Expected CsvChunk, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn empty_chunk_stream_completes_with_zero_parts() {
        let server = MockServer::start().await;
        let dispatcher = test_dispatcher(&server, 2, 1);

        let rx = feed(vec![]);
        let outcome = dispatcher.run(777, rx).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                parts: 0,
                average: None
            }
        );
    }
}
