//! Snowplow tracker-protocol encoding.
//!
//! Every envelope is sent as a self-describing (`ue`) event. The envelope's
//! schema and record are nested inside an `unstruct_event` wrapper, JSON
//! encoded, and base64url encoded into `ue_px`. A request body is a
//! `payload_data` self-describing JSON whose `data` array holds the events.
//!
//! ```text
//! {"schema": "iglu:com.snowplowanalytics.snowplow/payload_data/jsonschema/1-0-4",
//!  "data": [{"e": "ue", "eid": "...", "ue_px": base64url({
//!              "schema": "iglu:com.snowplowanalytics.snowplow/unstruct_event/jsonschema/1-0-0",
//!              "data": {"schema": <envelope schema>, "data": <record>}}), ...}]}
//! ```

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bytes::Bytes;
use s3mon_core::{Batch, Clock, EventEnvelope, NotificationRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DeliveryFailure;

/// Schema of a POSTed request body.
pub const PAYLOAD_DATA_SCHEMA: &str = "iglu:com.snowplowanalytics.snowplow/payload_data/jsonschema/1-0-4";

/// Schema wrapping the envelope inside `ue_px`.
pub const UNSTRUCT_EVENT_SCHEMA: &str =
    "iglu:com.snowplowanalytics.snowplow/unstruct_event/jsonschema/1-0-0";

/// Tracker version reported in `tv`.
pub const TRACKER_VERSION: &str = concat!("rust-s3mon-", env!("CARGO_PKG_VERSION"));

/// Server-side application platform code.
pub const PLATFORM: &str = "srv";

const EVENT_TYPE: &str = "ue";

/// Who the events are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerIdentity {
    /// Tracker namespace, sent as `tna`.
    pub namespace: String,
    /// Application id, sent as `aid`.
    pub app_id: String,
}

/// Generic `{"schema": ..., "data": ...}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfDescribing<T> {
    /// Iglu schema of `data`.
    pub schema: String,
    /// Payload described by `schema`.
    pub data: T,
}

/// One event in tracker-protocol form. All values are strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEvent {
    /// Event type.
    pub e: String,
    /// Event id.
    pub eid: String,
    /// Device created timestamp, ms.
    pub dtm: String,
    /// Device sent timestamp, ms.
    pub stm: String,
    /// Tracker version.
    pub tv: String,
    /// Platform.
    pub p: String,
    /// Tracker namespace.
    pub tna: String,
    /// Application id.
    pub aid: String,
    /// Base64url-encoded self-describing event.
    pub ue_px: String,
}

impl TrackerEvent {
    /// Decodes `ue_px` back into the envelope's schema and record.
    pub fn unstruct_payload(
        &self,
    ) -> Result<SelfDescribing<SelfDescribing<NotificationRecord>>, DeliveryFailure> {
        let raw = URL_SAFE_NO_PAD
            .decode(&self.ue_px)
            .map_err(|e| DeliveryFailure::encoding(format!("ue_px is not base64url: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| DeliveryFailure::encoding(e.to_string()))
    }
}

#[derive(Serialize)]
struct UnstructRef<'a> {
    schema: &'a str,
    data: EnvelopeRef<'a>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema: &'a str,
    data: &'a NotificationRecord,
}

/// Encodes batches into collector request bodies.
///
/// The creation timestamp (`dtm`) is fixed when the encoder is built, which
/// is when the handler tracks the events. The send timestamp (`stm`) is read
/// per request.
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    identity: TrackerIdentity,
    clock: Arc<dyn Clock>,
    created_at_ms: u64,
}

impl PayloadEncoder {
    /// Creates an encoder stamping events with the clock's current time.
    pub fn new(identity: TrackerIdentity, clock: Arc<dyn Clock>) -> Self {
        let created_at_ms = clock.unix_millis();
        Self { identity, clock, created_at_ms }
    }

    /// Encodes one envelope.
    pub fn encode_event(
        &self,
        envelope: &EventEnvelope,
        sent_at_ms: u64,
    ) -> Result<TrackerEvent, DeliveryFailure> {
        let unstruct = UnstructRef {
            schema: UNSTRUCT_EVENT_SCHEMA,
            data: EnvelopeRef { schema: envelope.schema().as_str(), data: envelope.payload() },
        };
        let json =
            serde_json::to_vec(&unstruct).map_err(|e| DeliveryFailure::encoding(e.to_string()))?;

        Ok(TrackerEvent {
            e: EVENT_TYPE.to_string(),
            eid: Uuid::new_v4().to_string(),
            dtm: self.created_at_ms.to_string(),
            stm: sent_at_ms.to_string(),
            tv: TRACKER_VERSION.to_string(),
            p: PLATFORM.to_string(),
            tna: self.identity.namespace.clone(),
            aid: self.identity.app_id.clone(),
            ue_px: URL_SAFE_NO_PAD.encode(json),
        })
    }

    /// Encodes a (sub-)batch into one `payload_data` request body.
    pub fn encode_batch(&self, batch: &Batch) -> Result<Bytes, DeliveryFailure> {
        let sent_at_ms = self.clock.unix_millis();
        let events = batch
            .iter()
            .map(|envelope| self.encode_event(envelope, sent_at_ms))
            .collect::<Result<Vec<_>, _>>()?;

        let body = SelfDescribing { schema: PAYLOAD_DATA_SCHEMA.to_string(), data: events };
        serde_json::to_vec(&body)
            .map(Bytes::from)
            .map_err(|e| DeliveryFailure::encoding(e.to_string()))
    }
}
