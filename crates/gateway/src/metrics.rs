//! Thin wrappers around the `metrics` crate's recording macros, so the
//! rest of the gateway never has to remember metric names (§5, §8 —
//! observability for the concurrency/delivery properties this spec cares
//! about, not a feature the Non-goals exclude).

use metrics::{counter, gauge};

pub fn record_connected(count: usize) {
    gauge!("pulsechat_gateway_connections").set(count as f64);
}

pub fn record_connected_users(count: usize) {
    gauge!("pulsechat_gateway_connected_users").set(count as f64);
}

pub fn record_message_delivered() {
    counter!("pulsechat_gateway_messages_delivered_total").increment(1);
}

pub fn record_message_queued() {
    counter!("pulsechat_gateway_messages_queued_total").increment(1);
}

pub fn record_message_dropped() {
    counter!("pulsechat_gateway_messages_dropped_total").increment(1);
}
