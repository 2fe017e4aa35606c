//! Rule payload XML (de)serialization (§3, §6) — the UDP datagram the
//! deployer pushes to each place. Same serde-over-`quick_xml` approach as
//! `token_xml`.

use crate::error::{Result, WorkflowError};
use crate::rulegen::render_rule_atoms;
use crate::types::RulePayload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "rulepayload")]
struct WireRulePayload {
    header: WireHeader,
    targetservice: WireTargetService,
    rulefiledata: WireRuleFileData,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireHeader {
    #[serde(rename = "ruleBaseVersion")]
    rule_base_version: String,
    #[serde(rename = "ruleBaseCommitment")]
    rule_base_commitment: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTargetService {
    #[serde(rename = "serviceName")]
    service_name: String,
    #[serde(rename = "operationName")]
    operation_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRuleFileData {
    #[serde(rename = "data")]
    data: String,
}

pub fn write_rule_payload_xml(payload: &RulePayload) -> Result<String> {
    let wire = WireRulePayload {
        header: WireHeader {
            rule_base_version: payload.rule_base_version.clone(),
            rule_base_commitment: payload.rule_base_commitment,
        },
        targetservice: WireTargetService {
            service_name: payload.target_service.clone(),
            operation_name: payload.target_operation.clone(),
            buffer: payload.target_buffer,
        },
        rulefiledata: WireRuleFileData { data: render_rule_atoms(&payload.content) },
    };
    quick_xml::se::to_string(&wire).map_err(|e| WorkflowError::Xml(e.to_string()))
}

/// Parsed rule-base facts the orchestrator reads back after receiving a
/// rule payload (§4.6 step 4) — header + target identity + raw atom text;
/// the orchestrator's own rule-base cache is responsible for interpreting
/// the atom text into `NodeType`/`meetsCondition`/etc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRulePayload {
    pub rule_base_version: String,
    pub rule_base_commitment: u64,
    pub target_service: String,
    pub target_operation: String,
    pub target_buffer: Option<u32>,
    pub raw_atoms: String,
}

pub fn parse_rule_payload_xml(xml: &str) -> Result<ParsedRulePayload> {
    let wire: WireRulePayload = quick_xml::de::from_str(xml).map_err(|e| WorkflowError::Xml(e.to_string()))?;
    Ok(ParsedRulePayload {
        rule_base_version: wire.header.rule_base_version,
        rule_base_commitment: wire.header.rule_base_commitment,
        target_service: wire.targetservice.service_name,
        target_operation: wire.targetservice.operation_name,
        target_buffer: wire.targetservice.buffer,
        raw_atoms: wire.rulefiledata.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeType, RuleContent};

    #[test]
    fn round_trips_through_xml() {
        let payload = RulePayload {
            rule_base_version: "v1".into(),
            rule_base_commitment: 3,
            target_service: "svcA".into(),
            target_operation: "op1".into(),
            target_buffer: Some(5),
            content: RuleContent {
                node_type: NodeType::EdgeNode,
                join_input_count: None,
                decision_values: Vec::new(),
                meets_conditions: Vec::new(),
                terminates_on: Vec::new(),
                buffer: Some(5),
            },
        };
        let xml = write_rule_payload_xml(&payload).unwrap();
        let parsed = parse_rule_payload_xml(&xml).unwrap();
        assert_eq!(parsed.rule_base_version, "v1");
        assert_eq!(parsed.rule_base_commitment, 3);
        assert_eq!(parsed.target_buffer, Some(5));
        assert!(parsed.raw_atoms.contains("NodeType(\"EdgeNode\")"));
    }
}
