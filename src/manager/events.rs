// CLASSIFICATION: COMMUNITY
// Filename: events.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-15

//! Asynchronous fabric event records.
//!
//! Components and peer managers report conditions as JSON event records.
//! Dispatch is by event-type name so new hardware event types degrade to a
//! logged warning instead of a parse failure.

use serde::{Deserialize, Serialize};

use crate::lattice_types::{Gcid, IfaceNum};

/// An interface stopped operating (peer power-off, cable pull).
pub const EV_IFACE_DOWN: &str = "iface-down";
/// An interface reported a sticky error condition.
pub const EV_IFACE_ERROR: &str = "iface-error";
/// Liveness beat from the primary manager.
pub const EV_MGR_BEAT: &str = "mgr-beat";

/// One event as received from the fabric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Reporting component.
    pub sender: Gcid,
    /// Interface the event concerns, when interface-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iface: Option<IfaceNum>,
    /// Remote component involved, when known to the reporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<Gcid>,
    /// Event-type name; dispatch key.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl EventRecord {
    /// Interface-scoped event with no payload.
    #[must_use]
    pub fn iface_event(kind: &str, sender: Gcid, iface: IfaceNum) -> Self {
        Self {
            sender,
            iface: Some(iface),
            remote: None,
            kind: kind.to_string(),
            data: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_with_type_key() {
        let ev = EventRecord::iface_event(EV_IFACE_DOWN, Gcid::new(1, 7), 2);
        let text = serde_json::to_string(&ev).expect("serialize");
        assert!(text.contains("\"type\":\"iface-down\""));
        assert!(!text.contains("\"remote\""));
        let back: EventRecord = serde_json::from_str(&text).expect("parse");
        assert_eq!(back, ev);
    }

    #[test]
    fn unknown_payload_is_preserved() {
        let text = r#"{"sender":{"sid":0,"cid":5},"type":"vendor-trap","data":{"code":9}}"#;
        let ev: EventRecord = serde_json::from_str(text).expect("parse");
        assert_eq!(ev.kind, "vendor-trap");
        assert_eq!(ev.data["code"], 9);
    }
}
