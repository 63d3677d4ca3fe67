//! Integration tests for metrics server functionality.

use serial_test::serial;
use topowatch_core::config::MetricsConfig;
use topowatch_daemon::metrics_server;

fn metrics_config(listen_addr: &str, port: u16, endpoint: &str) -> MetricsConfig {
    MetricsConfig {
        enabled: true,
        listen_addr: listen_addr.to_owned(),
        port,
        endpoint: endpoint.to_owned(),
    }
}

#[test]
fn test_listen_addr_resolves_configured_socket() {
    let addr = metrics_server::listen_addr(&metrics_config("127.0.0.1", 19102, "/metrics"))
        .expect("valid address");
    assert_eq!(addr.to_string(), "127.0.0.1:19102");
}

#[test]
fn test_listen_addr_rejects_invalid_ip() {
    let result = metrics_server::listen_addr(&metrics_config("999.999.999.999", 9102, "/metrics"));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_unsupported_endpoint() {
    let result =
        metrics_server::install_metrics_recorder(&metrics_config("127.0.0.1", 19103, "/custom"));
    let err = result.expect_err("custom endpoint should be rejected");
    assert!(err.to_string().contains("/custom"));
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_succeeds_with_valid_config() {
    let result =
        metrics_server::install_metrics_recorder(&metrics_config("127.0.0.1", 19104, "/metrics"));
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}
