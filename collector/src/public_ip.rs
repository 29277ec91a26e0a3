//! Best-effort discovery of the collector's public address.

use std::net::IpAddr;
use std::time::Duration;

/// Ask `url` for our public address.
///
/// One request, no retries. Any failure, including a body that is not an IP
/// address, yields `None`.
pub async fn discover_public_ip(url: &str, timeout: Duration) -> Option<IpAddr> {
    match fetch(url, timeout).await {
        Ok(body) => match body.trim().parse::<IpAddr>() {
            Ok(ip) => {
                tracing::info!(%ip, "Discovered public IP");
                Some(ip)
            }
            Err(_) => {
                tracing::warn!(url, body = body.trim(), "Public IP endpoint did not return an address");
                None
            }
        },
        Err(e) => {
            tracing::warn!(url, error = %e, "Public IP discovery failed, mhn_ip will be null");
            None
        }
    }
}

async fn fetch(url: &str, timeout: Duration) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}
