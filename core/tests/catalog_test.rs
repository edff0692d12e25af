use fleetwatch_core::catalog::{self, health, logs, stats, swarm, LogEvent, Timestamped};
use serde_json::json;

#[test]
fn log_record_decodes_and_upper_cases_level() {
    let event = logs::decode_log_stream(json!({
        "logStream": {"containerId": "c1", "content": "hello", "level": "warn", "timestamp": "2024-05-01T10:00:00Z"}
    }))
    .unwrap();
    assert_eq!(event.content, "hello");
    assert_eq!(event.level, "WARN");
    assert_eq!(event.container_id, "c1");
}

#[test]
fn missing_grouped_lines_and_line_count_use_defaults() {
    let event = logs::decode_log_stream(json!({"logStream": {"content": "x"}})).unwrap();
    assert_eq!(event.grouped_lines, Vec::<String>::new());
    assert_eq!(event.line_count, 1);
    assert_eq!(event.level, "INFO");
}

#[test]
fn explicit_nulls_use_defaults_too() {
    let event = logs::decode_log_stream(json!({
        "logStream": {"content": "x", "groupedLines": null, "lineCount": null, "level": null}
    }))
    .unwrap();
    assert!(event.grouped_lines.is_empty());
    assert_eq!(event.line_count, 1);
}

#[test]
fn grouped_lines_are_kept() {
    let event = logs::decode_log_stream(json!({
        "logStream": {"content": "panic", "groupedLines": ["at a", "at b"], "lineCount": 3, "level": "Error"}
    }))
    .unwrap();
    assert_eq!(event.grouped_lines, vec!["at a", "at b"]);
    assert_eq!(event.line_count, 3);
    assert_eq!(event.level, "ERROR");
}

#[test]
fn wrong_root_field_is_a_decode_error() {
    let err = logs::decode_log_stream(json!({"containerStats": {}})).unwrap_err();
    assert_eq!(err.code(), None);
}

#[test]
fn multi_container_and_stack_logs_decode() {
    let merged = logs::decode_multi_container_logs(json!({
        "multiContainerLogs": {"containerId": "c2", "content": "m", "level": "debug"}
    }))
    .unwrap();
    assert_eq!(merged.level, "DEBUG");

    let stack = logs::decode_stack_logs(json!({
        "stackLogs": {"stackName": "shop", "serviceName": "shop_api", "content": "up", "level": "info"}
    }))
    .unwrap();
    assert_eq!(stack.stack_name, "shop");
    assert_eq!(stack.level, "INFO");
    assert!(stack.grouped_lines.is_empty());
    assert_eq!(stack.line_count, 1);
}

#[test]
fn stats_counters_default_to_zero() {
    let s = stats::decode_container_stats(json!({
        "containerStats": {"containerId": "c1", "cpuPercent": 12.5, "memoryUsage": 1048576}
    }))
    .unwrap();
    assert_eq!(s.cpu_percent, 12.5);
    assert_eq!(s.memory_usage, 1_048_576);
    assert_eq!(s.memory_limit, 0);
    assert_eq!(s.pids, 0);
}

#[test]
fn health_and_node_status_are_upper_cased() {
    let h = health::decode_agent_health(json!({
        "agentHealth": {"agentId": "a1", "status": "healthy", "containerCount": 4}
    }))
    .unwrap();
    assert_eq!(h.status, "HEALTHY");
    assert_eq!(h.container_count, 4);

    let n = swarm::decode_node_event(json!({
        "nodeEvents": {"nodeId": "n1", "hostname": "worker-1", "status": "ready", "availability": "drain"}
    }))
    .unwrap();
    assert_eq!(n.status, "READY");
    assert_eq!(n.availability, "DRAIN");
}

#[test]
fn service_events_decode() {
    let e = swarm::decode_service_event(json!({
        "serviceEvents": {"serviceId": "s1", "serviceName": "api", "action": "update", "replicasRunning": 2, "replicasDesired": 3}
    }))
    .unwrap();
    assert_eq!(e.replicas_running, 2);
    assert_eq!(e.replicas_desired, 3);
    assert_eq!(e.message, None);
}

#[test]
fn requests_carry_documents_and_variables() {
    let req = catalog::container_logs("c1");
    assert_eq!(req.query, logs::CONTAINER_LOGS_SUBSCRIPTION);
    assert_eq!(req.variables, json!({"containerId": "c1"}));

    let ids = vec!["b".to_string(), "a".to_string()];
    let req = catalog::multi_container_logs(&ids);
    assert_eq!(req.variables, json!({"containerIds": ["b", "a"]}));

    assert_eq!(catalog::container_stats("c9").variables, json!({"containerId": "c9"}));
    assert_eq!(catalog::agent_health("a1").variables, json!({"agentId": "a1"}));
    assert_eq!(catalog::service_events("s1").variables, json!({"serviceId": "s1"}));
    assert_eq!(catalog::node_events("n1").variables, json!({"nodeId": "n1"}));
    assert_eq!(catalog::stack_logs("shop").variables, json!({"stackName": "shop"}));
}

#[test]
fn merged_key_ignores_order_and_duplicates() {
    let a = vec!["c2".to_string(), "c1".to_string(), "c2".to_string()];
    let b = vec!["c1".to_string(), "c2".to_string()];
    assert_eq!(catalog::merged_key(&a), catalog::merged_key(&b));
    assert_eq!(catalog::merged_key(&b), "c1,c2");
}

fn line(container: &str, ts: &str) -> LogEvent {
    LogEvent {
        container_id: container.to_string(),
        container_name: None,
        agent_id: None,
        timestamp: ts.to_string(),
        content: format!("{}@{}", container, ts),
        level: "INFO".to_string(),
        stream: None,
        grouped_lines: vec![],
        line_count: 1,
    }
}

#[test]
fn merge_orders_across_channels_by_record_timestamp() {
    let merged = catalog::merge_by_timestamp(vec![
        line("c2", "2024-05-01T10:00:02Z"),
        line("c1", "garbage"),
        line("c1", "2024-05-01T10:00:01+00:00"),
        line("c2", "2024-05-01T12:00:00.500+02:00"),
    ]);
    let order: Vec<&str> = merged.iter().map(|l| l.timestamp()).collect();
    assert_eq!(
        order,
        vec![
            "2024-05-01T12:00:00.500+02:00",
            "2024-05-01T10:00:01+00:00",
            "2024-05-01T10:00:02Z",
            "garbage",
        ]
    );
}
