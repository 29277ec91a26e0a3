//! Capabilities the relay needs from a link.
//!
//! The pipeline only publishes and the shutdown path only closes, so both are
//! expressed as small traits. [`BrokerLink`] implements them; tests substitute
//! in-memory recorders.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::link::BrokerLink;

/// Fire-and-forget publishing.
pub trait Publish: Send + Sync {
    fn publish(&self, channel: &str, payload: Bytes);
}

/// Idempotent close.
#[async_trait]
pub trait Close: Send + Sync {
    async fn close(&self);
}

impl Publish for BrokerLink {
    fn publish(&self, channel: &str, payload: Bytes) {
        BrokerLink::publish(self, channel, payload)
    }
}

#[async_trait]
impl Close for BrokerLink {
    async fn close(&self) {
        BrokerLink::close(self).await
    }
}

impl<T: Publish + ?Sized> Publish for Arc<T> {
    fn publish(&self, channel: &str, payload: Bytes) {
        (**self).publish(channel, payload)
    }
}

#[async_trait]
impl<T: Close + ?Sized> Close for Arc<T> {
    async fn close(&self) {
        (**self).close().await
    }
}
