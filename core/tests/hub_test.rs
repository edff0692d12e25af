mod support;

use std::time::Duration;

use fleetwatch_core::subscription::SubscriptionClient;
use fleetwatch_core::{ChannelState, ClientConfig, Fleetwatch, KeyedSubscription, StreamHub};
use serde_json::json;
use support::{drain, next_json, send_json, spawn_ws_server};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn two_consumers_share_one_socket() {
    let (url, server) = spawn_ws_server(|mut ws| async move {
        next_json(&mut ws).await.expect("connection_init");
        send_json(&mut ws, json!({"type": "connection_ack"})).await;
        let subscribe = next_json(&mut ws).await.expect("subscribe");
        assert_eq!(subscribe["payload"]["variables"], json!({"containerId": "c1"}));

        send_json(
            &mut ws,
            json!({
                "id": "1",
                "type": "next",
                "payload": {"data": {"containerStats": {"containerId": "c1", "cpuPercent": 42.0}}}
            }),
        )
        .await;

        // Both consumers gone: exactly one complete
        let rest = drain(&mut ws).await;
        assert_eq!(rest, vec![json!({"id": "1", "type": "complete"})]);
    })
    .await;

    let hub = StreamHub::new(SubscriptionClient::new(url));
    let mut first = hub.container_stats("c1");
    let second = hub.container_stats("c1");
    assert_eq!(hub.container_stats_registry().ref_count("c1"), 2);
    assert_eq!(hub.container_stats_registry().stats().total_opened, 1);

    let state = timeout(WAIT, first.changed())
        .await
        .expect("value in time")
        .expect("cell alive");
    let ChannelState::Value(stats) = state else {
        panic!("expected a value");
    };
    assert_eq!(stats.cpu_percent, 42.0);
    assert_eq!(stats.memory_usage, 0);
    assert_eq!(second.latest().map(|s| s.cpu_percent), Some(42.0));

    drop(first);
    assert_eq!(hub.container_stats_registry().ref_count("c1"), 1);
    drop(second);
    assert!(hub.container_stats_registry().is_empty());

    timeout(WAIT, server).await.expect("server done").expect("server ok");
}

#[tokio::test]
async fn keyed_binding_follows_the_selected_container() {
    let (url, server) = spawn_ws_server(|mut ws| async move {
        next_json(&mut ws).await.expect("connection_init");
        send_json(&mut ws, json!({"type": "connection_ack"})).await;
        next_json(&mut ws).await.expect("subscribe");
        send_json(
            &mut ws,
            json!({
                "id": "1",
                "type": "next",
                "payload": {"data": {"logStream": {
                    "containerId": "c1",
                    "content": "hello",
                    "level": "info"
                }}}
            }),
        )
        .await;
        drain(&mut ws).await;
    })
    .await;

    let hub = StreamHub::new(SubscriptionClient::new(url));
    let logs_hub = hub.clone();
    let mut logs = KeyedSubscription::new(move |id| logs_hub.container_logs(id));

    logs.set_key(Some("c1"));
    let state = timeout(WAIT, logs.changed())
        .await
        .expect("value in time")
        .expect("bound");
    assert_eq!(state.value().map(|l| l.content.clone()), Some("hello".to_string()));
    assert_eq!(logs.latest().map(|l| l.level.clone()), Some("INFO".to_string()));

    logs.clear();
    assert!(hub.container_logs_registry().is_empty());
    timeout(WAIT, server).await.expect("server done").expect("server ok");
}

#[tokio::test]
async fn merged_logs_key_is_order_insensitive() {
    let hub = StreamHub::new(SubscriptionClient::new("ws://127.0.0.1:9/ws".parse().unwrap()));
    let a = hub
        .multi_container_logs(&["b".to_string(), "a".to_string()])
        .unwrap();
    let b = hub
        .multi_container_logs(&["a".to_string(), " ".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(a.key(), "a,b");
    assert_eq!(b.key(), "a,b");

    let merged = hub
        .stats()
        .into_iter()
        .find(|(name, _)| *name == "merged_logs")
        .map(|(_, stats)| stats)
        .unwrap();
    assert_eq!(merged.total_opened, 1);
    assert_eq!(merged.active_channels, 1);
}

#[tokio::test]
async fn empty_container_set_opens_nothing() {
    let hub = StreamHub::new(SubscriptionClient::new("ws://127.0.0.1:9/ws".parse().unwrap()));
    assert!(hub.multi_container_logs(&[]).is_none());
    assert!(hub
        .multi_container_logs(&["".to_string(), "  ".to_string()])
        .is_none());

    let merged = hub
        .stats()
        .into_iter()
        .find(|(name, _)| *name == "merged_logs")
        .map(|(_, stats)| stats)
        .unwrap();
    assert_eq!(merged.total_opened, 0);
    assert_eq!(merged.active_channels, 0);
}

#[tokio::test]
async fn shutdown_clears_every_registry() {
    let fleet = Fleetwatch::new(&ClientConfig::with_endpoint("http://127.0.0.1:9")).unwrap();
    assert_eq!(fleet.endpoints.ws.as_str(), "ws://127.0.0.1:9/ws");

    let logs = fleet.streams.container_logs("c1");
    let health = fleet.streams.agent_health("a1");
    fleet.shutdown();

    assert!(logs.current().is_closed());
    assert!(health.current().is_closed());
    assert!(fleet.streams.stats().iter().all(|(_, s)| s.active_channels == 0));
}
