//! Temperature probing against an in-process hardware-monitor web server.

use async_trait::async_trait;
use pcmon::metrics::data::Provenance;
use pcmon::metrics::temperature::{RemoteSensorSource, ThermalZoneSource};
use pcmon::{SensorError, TemperatureProbe, TemperatureSource};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const OHM_TREE: &str =
    r#"{"Children":[{"Text":"CPU Temperature","Children":[{"Value":"45,3 °C"}]}]}"#;

/// Serve `body` with `status` to every connection and return the URL.
async fn serve(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/data.json", addr)
}

/// Platform stand-in that always fails, as when the process lacks privilege.
struct DeniedPlatform;

#[async_trait]
impl TemperatureSource for DeniedPlatform {
    fn name(&self) -> &'static str {
        "thermal-zone"
    }

    async fn read_celsius(&self) -> Result<f64, SensorError> {
        Err(SensorError::unavailable("access denied"))
    }
}

/// Platform stand-in that always answers.
struct WorkingPlatform;

#[async_trait]
impl TemperatureSource for WorkingPlatform {
    fn name(&self) -> &'static str {
        "thermal-zone"
    }

    async fn read_celsius(&self) -> Result<f64, SensorError> {
        Ok(88.0)
    }
}

fn remote(url: &str) -> Box<dyn TemperatureSource> {
    Box::new(RemoteSensorSource::new(url, Duration::from_millis(500)).unwrap())
}

#[tokio::test]
async fn test_remote_value_is_parsed_and_truncated() {
    let url = serve("200 OK", OHM_TREE).await;
    let source = RemoteSensorSource::new(url.as_str(), Duration::from_millis(500)).unwrap();

    assert_eq!(source.url(), url);
    assert_eq!(source.read_celsius().await.unwrap(), 45.3);

    let probe = TemperatureProbe::new(vec![remote(&url), Box::new(DeniedPlatform)]);
    let reading = probe.probe().await;
    assert_eq!(reading.celsius, Some(45));
    assert_eq!(reading.provenance, Provenance::Source("sensor-service"));
}

#[tokio::test]
async fn test_remote_wins_even_when_platform_works() {
    let url = serve("200 OK", OHM_TREE).await;
    let probe = TemperatureProbe::new(vec![remote(&url), Box::new(WorkingPlatform)]);

    assert_eq!(probe.probe().await.celsius, Some(45));
}

#[tokio::test]
async fn test_server_error_and_denied_platform_is_unavailable() {
    let url = serve("500 Internal Server Error", "{}").await;
    let probe = TemperatureProbe::new(vec![remote(&url), Box::new(DeniedPlatform)]);

    let reading = probe.probe().await;
    assert_eq!(reading.celsius, None);
    assert_eq!(reading.celsius_or_default(), 0);
    assert_eq!(reading.provenance, Provenance::Unavailable);
}

#[tokio::test]
async fn test_server_error_falls_back_to_platform() {
    let url = serve("500 Internal Server Error", "{}").await;
    let probe = TemperatureProbe::new(vec![remote(&url), Box::new(WorkingPlatform)]);

    let reading = probe.probe().await;
    assert_eq!(reading.celsius, Some(88));
    assert_eq!(reading.provenance, Provenance::Source("thermal-zone"));
}

#[tokio::test]
async fn test_malformed_payload_is_a_parse_failure() {
    let url = serve("200 OK", "<html>not json</html>").await;
    let source = RemoteSensorSource::new(url.as_str(), Duration::from_millis(500)).unwrap();

    assert!(matches!(
        source.read_celsius().await,
        Err(SensorError::Parse(_))
    ));
}

#[tokio::test]
async fn test_tree_without_cpu_temperature_yields_nothing() {
    let url = serve(
        "200 OK",
        r#"{"Children":[{"Text":"GPU Temperature","Children":[{"Value":"50 °C"}]}]}"#,
    )
    .await;
    let source = RemoteSensorSource::new(url.as_str(), Duration::from_millis(500)).unwrap();

    assert!(matches!(
        source.read_celsius().await,
        Err(SensorError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_first_match_without_value_stops_search() {
    let url = serve(
        "200 OK",
        r#"{"Children":[
            {"Text":"CPU Temperature","Children":[]},
            {"Text":"CPU Core Temperature","Children":[{"Value":"60 °C"}]}
        ]}"#,
    )
    .await;
    let source = RemoteSensorSource::new(url.as_str(), Duration::from_millis(500)).unwrap();

    assert!(source.read_celsius().await.is_err());
}

#[tokio::test]
async fn test_unreachable_service_times_out_quickly() {
    // Bound but never accepted: the connection hangs until the timeout.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/data.json", listener.local_addr().unwrap());
    let source = RemoteSensorSource::new(url.as_str(), Duration::from_millis(100)).unwrap();

    let started = std::time::Instant::now();
    assert!(source.read_celsius().await.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_default_chain_order() {
    let probe = TemperatureProbe::with_default_sources("http://127.0.0.1:9/data.json", Duration::from_millis(50));
    assert_eq!(probe.source_names(), vec!["sensor-service", "thermal-zone"]);

    let platform = ThermalZoneSource::with_sysfs_root("/nonexistent/pcmon");
    assert!(platform.read_celsius().await.is_err());
}
