//! Tests for the batch client.

use super::*;
use async_trait::async_trait;
use oystehr_domain::bundle::{Method, Operation};
use oystehr_domain::error::BundleError;
use oystehr_transport::{Transport, TransportError, TransportResult};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================
// Test Mocks
// ============================================================

type Responder = Box<dyn Fn(usize, &Value) -> TransportResult<Vec<u8>> + Send + Sync>;

/// Transport that records every bundle it receives and answers through a
/// closure given the call index and the parsed request.
struct MockTransport {
    requests: Mutex<Vec<Value>>,
    responder: Responder,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    fn new(responder: Responder) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responder,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answers every entry with status 200 and a resource naming its url.
    fn echo() -> Self {
        Self::new(Box::new(|_, request| Ok(echo_response(request, |_| "200"))))
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.requests()
            .iter()
            .map(|r| r["entry"].as_array().map_or(0, Vec::len))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> TransportResult<Vec<u8>> {
        assert_eq!(method, Method::Post);
        assert_eq!(url, "");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let request: Value = serde_json::from_slice(&body.unwrap_or_default()).unwrap();
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(index, &request)
    }
}

fn request_urls(request: &Value) -> Vec<String> {
    request["entry"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["request"]["url"].as_str().unwrap().to_string())
        .collect()
}

fn echo_response(request: &Value, status: impl Fn(&str) -> &'static str) -> Vec<u8> {
    let entry: Vec<Value> = request_urls(request)
        .iter()
        .map(|url| {
            json!({
                "resource": { "url": url },
                "response": { "status": status(url) }
            })
        })
        .collect();
    serde_json::to_vec(&json!({ "resourceType": "Bundle", "entry": entry })).unwrap()
}

fn get(path: &str) -> Operation {
    Operation::new(Method::Get, path)
}

fn client(transport: &Arc<MockTransport>, config: BatchConfig) -> BatchClient<Arc<MockTransport>> {
    BatchClient::new(Arc::clone(transport), config)
}

// ============================================================
// Section 1: Round Trip and Ordering
// ============================================================

#[tokio::test]
async fn test_single_entry_round_trip() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let client = client(&transport, BatchConfig::default());

    // Act
    let result = client
        .submit(
            Operation::new(Method::Post, "Patient")
                .with_body(json!({ "resourceType": "Patient" })),
        )
        .await;

    // Assert
    assert_eq!(result, Ok(json!({ "url": "Patient" })));
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["type"], "batch");
    assert_eq!(requests[0]["entry"][0]["request"]["method"], "POST");
    assert_eq!(
        requests[0]["entry"][0]["resource"],
        json!({ "resourceType": "Patient" })
    );
}

#[tokio::test]
async fn test_results_follow_response_positions() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let client = client(&transport, BatchConfig::default());

    // Act
    let receivers: Vec<_> = (0..20)
        .map(|i| client.enqueue(get(&format!("Patient/{i}"))))
        .collect();

    // Assert
    for (i, receiver) in receivers.into_iter().enumerate() {
        let result = receiver.await.unwrap();
        assert_eq!(result, Ok(json!({ "url": format!("Patient/{i}") })));
    }
    assert_eq!(transport.batch_sizes(), vec![20]);
}

#[tokio::test]
async fn test_conditional_update_sends_weak_etag() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let client = client(&transport, BatchConfig::default());

    // Act
    let result = client
        .submit(
            Operation::new(Method::Put, "Patient/1")
                .with_body(json!({ "resourceType": "Patient", "id": "1" }))
                .with_if_match("3"),
        )
        .await;

    // Assert
    assert!(result.is_ok());
    let request = &transport.requests()[0]["entry"][0]["request"];
    assert_eq!(request["method"], "PUT");
    assert_eq!(request["ifMatch"], "W/\"3\"");
}

// ============================================================
// Section 2: Failure Isolation
// ============================================================

#[tokio::test]
async fn test_entry_failure_is_isolated() {
    // Arrange
    let transport = Arc::new(MockTransport::new(Box::new(|_, request| {
        Ok(echo_response(request, |url| {
            if url == "Patient/missing" {
                "404"
            } else {
                "200"
            }
        }))
    })));
    let client = client(&transport, BatchConfig::default());

    // Act
    let first = client.enqueue(get("Patient/1"));
    let second = client.enqueue(get("Patient/missing"));
    let third = client.enqueue(get("Patient/3"));

    // Assert
    assert_eq!(first.await.unwrap(), Ok(json!({ "url": "Patient/1" })));
    let failure = second.await.unwrap().unwrap_err();
    assert_eq!(failure.entry_status(), Some(404));
    assert_eq!(
        failure,
        BatchError::EntryFailed {
            status: 404,
            body: json!({ "url": "Patient/missing" }),
        }
    );
    assert_eq!(third.await.unwrap(), Ok(json!({ "url": "Patient/3" })));
}

#[tokio::test]
async fn test_unreadable_entry_status_fails_only_that_entry() {
    // Arrange
    let transport = Arc::new(MockTransport::new(Box::new(|_, request| {
        Ok(echo_response(request, |url| {
            if url == "Patient/2" {
                "unknown"
            } else {
                "201 Created"
            }
        }))
    })));
    let client = client(&transport, BatchConfig::default());

    // Act
    let first = client.enqueue(get("Patient/1"));
    let second = client.enqueue(get("Patient/2"));

    // Assert
    assert!(first.await.unwrap().is_ok());
    assert_eq!(
        second.await.unwrap(),
        Err(BatchError::InvalidStatus {
            raw: "unknown".to_string()
        })
    );
}

#[tokio::test]
async fn test_count_mismatch_fails_whole_batch() {
    // Arrange
    let transport = Arc::new(MockTransport::new(Box::new(|_, request| {
        let mut response: Value = serde_json::from_slice(&echo_response(request, |_| "200"))
            .unwrap();
        response["entry"].as_array_mut().unwrap().pop();
        Ok(serde_json::to_vec(&response).unwrap())
    })));
    let client = client(&transport, BatchConfig::default());

    // Act
    let receivers: Vec<_> = (0..3)
        .map(|i| client.enqueue(get(&format!("Patient/{i}"))))
        .collect();

    // Assert
    for receiver in receivers {
        assert_eq!(
            receiver.await.unwrap(),
            Err(BatchError::Protocol(BundleError::CountMismatch {
                expected: 3,
                actual: 2
            }))
        );
    }
}

#[tokio::test]
async fn test_extra_response_entries_fail_whole_batch() {
    // Arrange
    let transport = Arc::new(MockTransport::new(Box::new(|_, request| {
        let mut response: Value = serde_json::from_slice(&echo_response(request, |_| "200"))
            .unwrap();
        let extra = response["entry"][0].clone();
        response["entry"].as_array_mut().unwrap().push(extra);
        Ok(serde_json::to_vec(&response).unwrap())
    })));
    let client = client(&transport, BatchConfig::default());

    // Act
    let first = client.enqueue(get("Patient/1"));
    let second = client.enqueue(get("Patient/2"));

    // Assert
    let expected = Err(BatchError::Protocol(BundleError::CountMismatch {
        expected: 2,
        actual: 3,
    }));
    assert_eq!(first.await.unwrap(), expected);
    assert_eq!(second.await.unwrap(), expected);
}

#[tokio::test]
async fn test_missing_entry_array_fails_whole_batch() {
    // Arrange
    let transport = Arc::new(MockTransport::new(Box::new(|_, _| {
        Ok(br#"{"resourceType":"Bundle"}"#.to_vec())
    })));
    let client = client(&transport, BatchConfig::default());

    // Act
    let first = client.enqueue(get("Patient/1"));
    let second = client.enqueue(get("Patient/2"));

    // Assert
    let expected = Err(BatchError::Protocol(BundleError::MissingEntries));
    assert_eq!(first.await.unwrap(), expected);
    assert_eq!(second.await.unwrap(), expected);
}

#[tokio::test]
async fn test_transport_failure_only_affects_its_batch() {
    // Arrange
    let transport = Arc::new(MockTransport::new(Box::new(|index, request| {
        if index == 0 {
            Err(TransportError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        } else {
            Ok(echo_response(request, |_| "200"))
        }
    })));
    let client = client(&transport, BatchConfig::default().with_max_batch_size(2));

    // Act
    let receivers: Vec<_> = (0..4)
        .map(|i| client.enqueue(get(&format!("Patient/{i}"))))
        .collect();
    let results: Vec<_> = futures::future::join_all(receivers)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    // Assert
    let failed = Err(BatchError::Transport(TransportError::Status {
        status: 500,
        body: "boom".to_string(),
    }));
    assert_eq!(results[0], failed);
    assert_eq!(results[1], failed);
    assert_eq!(results[2], Ok(json!({ "url": "Patient/2" })));
    assert_eq!(results[3], Ok(json!({ "url": "Patient/3" })));
    assert_eq!(transport.batch_sizes(), vec![2, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_send_deadline_fails_batch_with_timeout() {
    // Arrange
    let transport =
        Arc::new(MockTransport::echo().with_delay(Duration::from_secs(60)));
    let client = client(
        &transport,
        BatchConfig::default().with_send_timeout(Duration::from_secs(1)),
    );

    // Act
    let result = client.submit(get("Patient/1")).await;

    // Assert
    assert_eq!(
        result,
        Err(BatchError::Transport(TransportError::Timeout {
            duration_ms: 1000
        }))
    );
}

fn reject_bundle(_batch: &[PendingEntry]) -> oystehr_domain::BundleResult<Vec<u8>> {
    Err(BundleError::Serialize {
        message: "unsupported value".to_string(),
    })
}

#[tokio::test]
async fn test_encoding_failure_fails_every_batch_without_sending() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let coordinator = DrainCoordinator::new(
        Arc::clone(&transport),
        BatchConfig::default().with_max_batch_size(2),
    )
    .with_encoder(reject_bundle);
    let mut receivers = Vec::new();
    for i in 0..3 {
        let (entry, receiver) = PendingEntry::new(get(&format!("Patient/{i}")));
        coordinator.queue().push(entry);
        receivers.push(receiver);
    }

    // Act
    let batches = coordinator.drain().await;

    // Assert
    assert_eq!(batches, 2);
    assert!(coordinator.queue().is_empty());
    assert!(transport.requests().is_empty());
    for receiver in receivers {
        assert_eq!(
            receiver.await.unwrap(),
            Err(BatchError::Assembly(BundleError::Serialize {
                message: "unsupported value".to_string(),
            }))
        );
    }
}

// ============================================================
// Section 3: Partitioning and Draining
// ============================================================

#[tokio::test]
async fn test_max_batch_size_partitions_queue() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let client = client(&transport, BatchConfig::default().with_max_batch_size(100));

    // Act
    let receivers: Vec<_> = (0..250)
        .map(|i| client.enqueue(get(&format!("Patient/{i}"))))
        .collect();
    let results = futures::future::join_all(receivers).await;

    // Assert
    assert_eq!(transport.batch_sizes(), vec![100, 100, 50]);
    let mut sent = Vec::new();
    for request in transport.requests() {
        sent.extend(request_urls(&request));
    }
    let expected: Vec<String> = (0..250).map(|i| format!("Patient/{i}")).collect();
    assert_eq!(sent, expected);
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));
}

#[tokio::test]
async fn test_zero_batch_size_sends_whole_queue() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let client = client(&transport, BatchConfig::default().with_max_batch_size(0));

    // Act
    let receivers: Vec<_> = (0..250)
        .map(|i| client.enqueue(get(&format!("Patient/{i}"))))
        .collect();
    futures::future::join_all(receivers).await;

    // Assert
    assert_eq!(transport.batch_sizes(), vec![250]);
}

#[tokio::test]
async fn test_drain_of_empty_queue_sends_nothing() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let coordinator = DrainCoordinator::new(Arc::clone(&transport), BatchConfig::default());

    // Act
    let batches = coordinator.drain().await;

    // Assert
    assert_eq!(batches, 0);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_direct_drain_reports_batches_sent() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let coordinator = DrainCoordinator::new(
        Arc::clone(&transport),
        BatchConfig::default().with_max_batch_size(100),
    );
    let mut receivers = Vec::new();
    for i in 0..250 {
        let (entry, receiver) = PendingEntry::new(get(&format!("Patient/{i}")));
        coordinator.queue().push(entry);
        receivers.push(receiver);
    }

    // Act
    let batches = coordinator.drain().await;

    // Assert
    assert_eq!(batches, 3);
    assert!(coordinator.queue().is_empty());
    for receiver in receivers {
        assert!(receiver.await.unwrap().is_ok());
    }
}

#[tokio::test(start_paused = true)]
async fn test_entry_queued_during_drain_is_sent() {
    // Arrange
    let transport =
        Arc::new(MockTransport::echo().with_delay(Duration::from_millis(100)));
    let client = client(&transport, BatchConfig::default());
    let first = client.enqueue(get("Patient/1"));

    // Let the first drain take the lock and start sending.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.pending(), 0);

    // Act
    let second = client.enqueue(get("Patient/2"));

    // Assert
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert_eq!(transport.batch_sizes(), vec![1, 1]);
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_one_batch_in_flight() {
    // Arrange
    let transport =
        Arc::new(MockTransport::echo().with_delay(Duration::from_millis(5)));
    let client = client(&transport, BatchConfig::default().with_max_batch_size(10));

    // Act
    let handles: Vec<_> = (0..100)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.submit(get(&format!("Patient/{i}"))).await })
        })
        .collect();
    let results = futures::future::join_all(handles).await;

    // Assert
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(
            result.unwrap(),
            Ok(json!({ "url": format!("Patient/{i}") }))
        );
    }
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(transport.batch_sizes().iter().sum::<usize>(), 100);
    assert_eq!(client.pending(), 0);
}

// ============================================================
// Section 4: Delivery
// ============================================================

#[tokio::test]
async fn test_abandoned_receiver_does_not_block_siblings() {
    // Arrange
    let transport = Arc::new(MockTransport::echo());
    let client = client(&transport, BatchConfig::default());

    // Act
    let first = client.enqueue(get("Patient/1"));
    drop(client.enqueue(get("Patient/2")));
    let third = client.enqueue(get("Patient/3"));

    // Assert
    assert_eq!(first.await.unwrap(), Ok(json!({ "url": "Patient/1" })));
    assert_eq!(third.await.unwrap(), Ok(json!({ "url": "Patient/3" })));
    assert_eq!(transport.batch_sizes(), vec![3]);
}

#[test]
fn test_deliver_reports_abandoned_caller() {
    // Arrange
    let (entry, receiver) = PendingEntry::new(get("Patient/1"));
    drop(receiver);

    // Act
    let delivered = entry.deliver(Ok(Value::Null));

    // Assert
    assert!(!delivered);
}

#[test]
fn test_default_config() {
    let config = BatchConfig::default();

    assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
    assert_eq!(config.send_timeout, DEFAULT_SEND_TIMEOUT);
    assert_eq!(config.send_timeout, Duration::from_secs(30));
    assert!(config.batch_path.is_empty());
}
