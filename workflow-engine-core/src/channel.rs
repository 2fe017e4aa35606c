//! Channel / Port Resolution (§4.8).

use crate::error::{Result, WorkflowError};
use crate::facts::RuleFactStore;

pub const BASE_RULE_PORT: u32 = 20000;
pub const BASE_EVENT_PORT: u32 = 10000;
pub const BASE_SYNC_PORT: u32 = 30000;
pub const BASE_CONFIRM_PORT: u32 = 35000;
pub const BASE_SHUTDOWN_PORT: u32 = 39000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub channel_number: u32,
    pub normalized_addr: String,
    pub target_port: u32,
}

/// Resolve `(service, operation)` to a channel + computed inbound port
/// (§4.8). `base_port` selects which port family the caller needs —
/// [`BASE_RULE_PORT`] for rule-payload pushes, [`BASE_EVENT_PORT`] for
/// token events.
pub fn resolve_channel(
    facts: &dyn RuleFactStore,
    service: &str,
    operation: &str,
    base_port: u32,
) -> Result<ResolvedChannel> {
    let endpoint = facts
        .active_service(service, operation)
        .or_else(|| facts.has_operation(service, operation))
        .ok_or_else(|| WorkflowError::ServiceNotFound {
            service: service.to_string(),
            operation: operation.to_string(),
        })?;

    let channel_id = endpoint.get("channelId").unwrap_or("0").to_string();
    let declared_port: u32 = endpoint.get("port").and_then(|p| p.parse().ok()).unwrap_or(0);

    let bound = facts
        .bound_channel(&channel_id)
        .ok_or_else(|| WorkflowError::ChannelUnresolved(channel_id.clone()))?;
    let addr = bound.get("addr").unwrap_or_default().to_string();

    let (channel_number, normalized_addr) = classify_address(&addr, &channel_id);

    Ok(ResolvedChannel {
        channel_number,
        normalized_addr,
        target_port: base_port + channel_number * 1000 + declared_port,
    })
}

/// Classify an address as unicast (first octet 0..223 or 240..255, channel
/// number 0 per the unicast-maps-to-0 rule of §4.8) or local multicast
/// (224/4, normalized to `224.1.{oct3}.{oct4}`, channel number parsed from
/// the channel id — a multicast group is still bound to one of several
/// channels, it's only unicast that collapses to 0). Anything else is used
/// raw with channel number parsed from the channel id if numeric, else 0.
fn classify_address(addr: &str, channel_id: &str) -> (u32, String) {
    let octets: Vec<u32> = addr.split('.').filter_map(|o| o.parse().ok()).collect();
    if octets.len() == 4 {
        let first = octets[0];
        if (0..=223).contains(&first) || (240..=255).contains(&first) {
            return (0, addr.to_string());
        }
        if (224..=239).contains(&first) {
            let normalized = format!("224.1.{}.{}", octets[2], octets[3]);
            return (parse_channel_number(channel_id).unwrap_or(0), normalized);
        }
    }
    let parsed_channel = parse_channel_number(channel_id).unwrap_or(0);
    (parsed_channel, addr.to_string())
}

/// Parse the numeric suffix from channel-id forms like `ip3`, `a3`, or a
/// bare number.
fn parse_channel_number(channel_id: &str) -> Option<u32> {
    channel_id
        .trim_start_matches(|c: char| c.is_alphabetic())
        .parse()
        .ok()
}
