//! Token envelope XML (de)serialization (§3, §6). The teacher's XML work
//! (`compiler/parser.rs`) only ever reads BPMN-XML with `quick_xml`'s
//! streaming `Reader`; this spec's tokens travel as XML in *and* out, so
//! this module exercises `quick_xml`'s serde-based reader and writer
//! instead, via plain `#[derive(Serialize, Deserialize)]` structs shaped
//! like the wire document.

use crate::error::{Result, WorkflowError};
use crate::types::{JoinAttribute, MonitorData, ServiceRef, Token, TokenHeader, TransitionMeta};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "token")]
struct WireToken {
    header: WireHeader,
    #[serde(rename = "joinAttribute")]
    join_attribute: WireJoinAttribute,
    service: WireService,
    #[serde(rename = "monitorData")]
    monitor_data: WireMonitorData,
    #[serde(rename = "transition", skip_serializing_if = "Option::is_none")]
    transition: Option<WireTransition>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireHeader {
    #[serde(rename = "sequenceId")]
    sequence_id: i64,
    #[serde(rename = "ruleBaseVersion", skip_serializing_if = "Option::is_none")]
    rule_base_version: Option<String>,
    #[serde(rename = "monitorIncomingEvents", default)]
    monitor_incoming_events: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireJoinAttribute {
    #[serde(rename = "attributeName")]
    attribute_name: String,
    #[serde(rename = "attributeValue")]
    attribute_value: String,
    #[serde(rename = "notAfter")]
    not_after: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireService {
    #[serde(rename = "serviceName")]
    service_name: String,
    operation: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct WireMonitorData {
    #[serde(rename = "processStartTime", default)]
    process_start_time: i64,
    #[serde(rename = "eventArrivalTime", default)]
    event_arrival_time: i64,
    #[serde(rename = "processElapsedTime", default)]
    process_elapsed_time: i64,
    #[serde(rename = "callingService", skip_serializing_if = "Option::is_none")]
    calling_service: Option<String>,
    #[serde(rename = "lostEvents", default)]
    lost_events: u32,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct WireTransition {
    #[serde(rename = "previousPlace", skip_serializing_if = "Option::is_none")]
    previous_place: Option<String>,
    #[serde(rename = "forkTransition", skip_serializing_if = "Option::is_none")]
    fork_transition: Option<String>,
    #[serde(rename = "parentTokenId", skip_serializing_if = "Option::is_none")]
    parent_token_id: Option<i64>,
}

impl From<&Token> for WireToken {
    fn from(t: &Token) -> Self {
        let has_transition_meta = t.transition.previous_place.is_some()
            || t.transition.fork_transition.is_some()
            || t.transition.parent_token_id.is_some();
        WireToken {
            header: WireHeader {
                sequence_id: t.header.sequence_id,
                rule_base_version: t.header.rule_base_version.clone(),
                monitor_incoming_events: t.header.monitor_incoming_events,
            },
            join_attribute: WireJoinAttribute {
                attribute_name: t.join_attribute.attribute_name.clone(),
                attribute_value: t.join_attribute.attribute_value.clone(),
                not_after: t.join_attribute.not_after,
            },
            service: WireService {
                service_name: t.service.service_name.clone(),
                operation: t.service.operation.clone(),
            },
            monitor_data: WireMonitorData {
                process_start_time: t.monitor.process_start_time,
                event_arrival_time: t.monitor.event_arrival_time,
                process_elapsed_time: t.monitor.process_elapsed_time,
                calling_service: t.monitor.calling_service.clone(),
                lost_events: t.monitor.lost_events,
            },
            transition: has_transition_meta.then(|| WireTransition {
                previous_place: t.transition.previous_place.clone(),
                fork_transition: t.transition.fork_transition.clone(),
                parent_token_id: t.transition.parent_token_id,
            }),
        }
    }
}

impl From<WireToken> for Token {
    fn from(w: WireToken) -> Self {
        Token {
            header: TokenHeader {
                sequence_id: w.header.sequence_id,
                rule_base_version: w.header.rule_base_version,
                monitor_incoming_events: w.header.monitor_incoming_events,
            },
            join_attribute: JoinAttribute {
                attribute_name: w.join_attribute.attribute_name,
                attribute_value: w.join_attribute.attribute_value,
                not_after: w.join_attribute.not_after,
            },
            service: ServiceRef {
                service_name: w.service.service_name,
                operation: w.service.operation,
            },
            monitor: MonitorData {
                process_start_time: w.monitor_data.process_start_time,
                event_arrival_time: w.monitor_data.event_arrival_time,
                process_elapsed_time: w.monitor_data.process_elapsed_time,
                calling_service: w.monitor_data.calling_service,
                lost_events: w.monitor_data.lost_events,
            },
            transition: w.transition.map(|t| TransitionMeta {
                previous_place: t.previous_place,
                fork_transition: t.fork_transition,
                parent_token_id: t.parent_token_id,
            }).unwrap_or_default(),
        }
    }
}

pub fn write_token_xml(token: &Token) -> Result<String> {
    let wire = WireToken::from(token);
    quick_xml::se::to_string(&wire).map_err(|e| WorkflowError::Xml(e.to_string()))
}

pub fn parse_token_xml(xml: &str) -> Result<Token> {
    let wire: WireToken = quick_xml::de::from_str(xml).map_err(|e| WorkflowError::Xml(e.to_string()))?;
    Ok(wire.into())
}
