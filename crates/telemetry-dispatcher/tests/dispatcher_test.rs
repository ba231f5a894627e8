// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::helpers::{names, start_dispatcher, test_config};
use common::mocks::RecordingTransport;
use std::collections::HashSet;
use std::sync::Arc;
use telemetry_dispatcher::{
    Attributes, DispatcherConfig, SenderState, SessionIdMode, TransportError, WireFormat,
};

fn connectivity_failure() -> Result<(), TransportError> {
    Err(TransportError::Connectivity("connection refused".to_string()))
}

#[tokio::test]
async fn delivers_in_enqueue_order_without_failures() {
    let transport = Arc::new(RecordingTransport::accepting());
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    let expected = names(20);
    for name in &expected {
        dispatcher.log(name.as_str());
    }

    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");
    assert_eq!(stats.delivered, 20);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.state, SenderState::Idle);
    assert_eq!(transport.delivered_names(), expected);
}

#[tokio::test]
async fn failed_item_is_retried_before_later_items() {
    let transport = Arc::new(RecordingTransport::new(vec![
        Ok(()),
        Ok(()),
        connectivity_failure(),
    ]));
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    for name in ["a", "b", "c", "d"] {
        dispatcher.log(name);
    }
    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.pending, 2);

    dispatcher.log("e");
    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");
    assert_eq!(stats.pending, 0);
    assert_eq!(transport.delivered_names(), vec!["a", "b", "c", "d", "e"]);

    let attempted: Vec<String> = transport
        .attempts()
        .iter()
        .map(|a| a.get("eventName").unwrap_or_default().to_string())
        .collect();
    assert_eq!(attempted, vec!["a", "b", "c", "c", "d", "e"]);
}

#[tokio::test]
async fn purchase_is_delivered_once_with_original_device_time() {
    let transport = Arc::new(RecordingTransport::new(vec![connectivity_failure()]));
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    dispatcher.log_event("purchase", Attributes::new().with("item", "sword"));
    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.pending, 1);

    let first_attempt = transport.attempts()[0].clone();
    assert!(transport.delivered().is_empty());

    dispatcher.log("second");
    dispatcher.wait_idle().await.expect("dispatcher is running");

    assert_eq!(transport.delivered_names(), vec!["purchase", "second"]);
    let purchase = &transport.delivered()[0];
    assert_eq!(purchase.get("item"), Some("sword"));
    assert_eq!(purchase.get("deviceTime"), first_attempt.get("deviceTime"));
    assert_eq!(purchase.get("sessionId"), first_attempt.get("sessionId"));
}

#[tokio::test]
async fn events_logged_mid_flight_join_the_same_drain() {
    let transport = Arc::new(RecordingTransport::accepting().gated());
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    dispatcher.log("first");
    transport.wait_for_send().await;

    for name in ["second", "third", "fourth"] {
        dispatcher.log(name);
    }
    let stats = dispatcher.stats().await.expect("dispatcher is running");
    assert_eq!(stats.state, SenderState::AwaitingTransport);
    assert_eq!(stats.pending, 3);

    transport.release(4);
    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");

    assert_eq!(
        transport.delivered_names(),
        vec!["first", "second", "third", "fourth"]
    );
    assert_eq!(transport.attempts().len(), 4);
    assert_eq!(stats.drains_started, 1);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_share_one_drain_loop() {
    let transport = Arc::new(RecordingTransport::accepting());
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    let producers: Vec<_> = (0..8)
        .map(|producer| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                for i in 0..25 {
                    dispatcher.log(format!("p{producer}-{i}"));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.expect("producer task failed");
    }

    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");
    assert_eq!(stats.delivered, 200);
    assert_eq!(transport.max_in_flight(), 1);

    let delivered = transport.delivered_names();
    let unique: HashSet<&String> = delivered.iter().collect();
    assert_eq!(unique.len(), 200);

    // each producer's events keep their relative order
    for producer in 0..8 {
        let prefix = format!("p{producer}-");
        let sequence: Vec<usize> = delivered
            .iter()
            .filter_map(|name| name.strip_prefix(&prefix))
            .map(|i| i.parse().expect("numeric suffix"))
            .collect();
        assert_eq!(sequence, (0..25).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn logging_never_fails_while_collector_is_unreachable() {
    let transport = Arc::new(RecordingTransport::unreachable());
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    for i in 0..10_000 {
        dispatcher.log(format!("offline-{i}"));
    }

    let stats = dispatcher.wait_idle().await.expect("dispatcher is running");
    assert_eq!(stats.pending, 10_000);
    assert_eq!(stats.delivered, 0);
    assert!(transport.delivered().is_empty());
}

#[tokio::test]
async fn per_dispatcher_session_id_is_stable() {
    let transport = Arc::new(RecordingTransport::accepting());
    let config = DispatcherConfig {
        session_id_mode: SessionIdMode::PerDispatcher,
        ..test_config()
    };
    let dispatcher = start_dispatcher(&config, transport.clone());

    dispatcher.log("start");
    dispatcher.log("stop");
    dispatcher.wait_idle().await.expect("dispatcher is running");

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].get("sessionId"), delivered[1].get("sessionId"));
}

#[tokio::test]
async fn per_event_session_id_is_fresh() {
    let transport = Arc::new(RecordingTransport::accepting());
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    dispatcher.log("start");
    dispatcher.log("stop");
    dispatcher.wait_idle().await.expect("dispatcher is running");

    let delivered = transport.delivered();
    assert_ne!(delivered[0].get("sessionId"), delivered[1].get("sessionId"));
}

#[tokio::test]
async fn object_wire_format_reaches_the_transport() {
    let transport = Arc::new(RecordingTransport::accepting().with_wire_format(WireFormat::Object));
    let config = DispatcherConfig {
        wire_format: WireFormat::Object,
        ..test_config()
    };
    let dispatcher = start_dispatcher(&config, transport.clone());

    dispatcher.log_event("login", Attributes::new().with("level", "info"));
    dispatcher.wait_idle().await.expect("dispatcher is running");

    let delivered = transport.delivered();
    assert_eq!(delivered[0].get("eventName"), Some("login"));
    assert_eq!(delivered[0].get("level"), Some("info"));
}

#[tokio::test]
async fn shutdown_drops_pending_events() {
    let transport = Arc::new(RecordingTransport::accepting().gated());
    let dispatcher = start_dispatcher(&test_config(), transport.clone());

    dispatcher.log("in-flight");
    transport.wait_for_send().await;
    dispatcher.log("queued");

    dispatcher.shutdown().expect("dispatcher is running");
    while dispatcher.is_running() {
        tokio::task::yield_now().await;
    }

    assert!(transport.delivered().is_empty());
    assert!(dispatcher.wait_idle().await.is_err());
}
