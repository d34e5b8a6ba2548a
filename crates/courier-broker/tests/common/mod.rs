//! Container-backed NSQ deployment for integration tests.

use courier_broker::NsqConfig;
use std::net::TcpListener;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use uuid::Uuid;

const NSQ_IMAGE: &str = "nsqio/nsq";
const NSQ_TAG: &str = "v1.3.0";
const LOOKUPD_TCP_PORT: u16 = 4160;
const LOOKUPD_HTTP_PORT: u16 = 4161;

/// `nsqlookupd` and `nsqd` on a private network.
///
/// nsqd advertises `127.0.0.1` and listens on the same port inside and
/// outside its container, so consumers on the host can reach the address
/// lookupd hands out.
pub struct TestNsq {
    _lookupd: ContainerAsync<GenericImage>,
    _nsqd: ContainerAsync<GenericImage>,
    config: NsqConfig,
}

impl TestNsq {
    pub async fn new() -> Self {
        let network = format!("courier-nsq-{}", Uuid::new_v4().simple());
        let lookupd_name = format!("lookupd-{}", Uuid::new_v4().simple());

        let lookupd = GenericImage::new(NSQ_IMAGE, NSQ_TAG)
            .with_exposed_port(LOOKUPD_TCP_PORT.tcp())
            .with_exposed_port(LOOKUPD_HTTP_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("HTTP: listening on"))
            .with_cmd(["/nsqlookupd"])
            .with_network(network.as_str())
            .with_container_name(lookupd_name.as_str())
            .start()
            .await
            .expect("Failed to start nsqlookupd container");
        let http_port = lookupd
            .get_host_port_ipv4(LOOKUPD_HTTP_PORT)
            .await
            .expect("Failed to get nsqlookupd HTTP port");

        let tcp_port = free_port();
        let nsqd = GenericImage::new(NSQ_IMAGE, NSQ_TAG)
            .with_exposed_port(tcp_port.tcp())
            .with_wait_for(WaitFor::message_on_stderr("TCP: listening on"))
            .with_cmd([
                "/nsqd".to_string(),
                "--broadcast-address=127.0.0.1".to_string(),
                format!("--tcp-address=0.0.0.0:{}", tcp_port),
                format!("--lookupd-tcp-address={}:{}", lookupd_name, LOOKUPD_TCP_PORT),
                "--data-path=/tmp".to_string(),
            ])
            .with_network(network.as_str())
            .with_mapped_port(tcp_port, tcp_port.tcp())
            .start()
            .await
            .expect("Failed to start nsqd container");

        Self {
            _lookupd: lookupd,
            _nsqd: nsqd,
            config: NsqConfig {
                host: "127.0.0.1".to_string(),
                tcp_port,
                http_port,
            },
        }
    }

    pub fn config(&self) -> &NsqConfig {
        &self.config
    }

    /// Wait until lookupd lists a producer for `topic`.
    pub async fn wait_for_topic(&self, topic: &str, max_attempts: u32) {
        let url = format!("{}/lookup?topic={}", self.config.lookupd_url(), topic);
        let http = reqwest::Client::new();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let producers = match http.get(&url).send().await {
                Ok(response) if response.status().is_success() => response
                    .text()
                    .await
                    .ok()
                    .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
                    .and_then(|body| body["producers"].as_array().map(Vec::len))
                    .unwrap_or(0),
                _ => 0,
            };
            if producers > 0 {
                return;
            }
            if attempts >= max_attempts {
                panic!("Topic {} not registered with nsqlookupd after {} attempts", topic, max_attempts);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

/// A host port that was free a moment ago.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to reserve a local port")
}
