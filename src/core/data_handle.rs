use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::constants::NANOVOLTS_PER_MILLIVOLT;
use crate::core::format::lead_label;
use crate::core::reader::IshneReader;

#[derive(Serialize)]
struct LeadPayload {
    timestamp: f64,
    value: f64,
    desc: String,
    seq: u64,
    end_flag: bool,
}

/// Streams one decoded lead over a websocket, point by point: elapsed
/// seconds plus the gain-scaled millivolt value, then a final end-flag
/// message. The reader is immutable, so no locking around it.
pub async fn handle_ws_fetch(
    mut socket: WebSocket,
    reader: Arc<IshneReader>,
    lead_index: usize,
    lead_name: String,
) {
    info!("ws_fetch streaming started: {}", lead_name);

    let header = match reader.header() {
        Ok(header) => header,
        Err(e) => {
            error!("reader has no parsed header: {}", e);
            return;
        }
    };

    // Decode fresh; the sample set lives only for this stream.
    let samples = match reader.decode_samples() {
        Ok(samples) => samples,
        Err(e) => {
            error!("decode_samples failed: {}", e);
            return;
        }
    };

    let lead = match samples.leads.get(lead_index) {
        Some(lead) => lead,
        None => {
            error!("lead index out of range: {}", lead_index);
            return;
        }
    };

    let label = lead_label(header.lead_spec[lead_index]);
    let resolution = f64::from(header.resolution[lead_index]);
    let rate = f64::from(header.sampling_rate);
    let mut seq: u64 = 0;

    for (i, raw) in lead.iter().enumerate() {
        let payload = LeadPayload {
            timestamp: i as f64 / rate,
            value: f64::from(*raw) * resolution / NANOVOLTS_PER_MILLIVOLT,
            desc: label.to_string(),
            seq,
            end_flag: false,
        };

        let json = match serde_json::to_string(&payload) {
            Ok(j) => j,
            Err(e) => {
                error!("json serialize error: {}", e);
                return;
            }
        };

        if let Err(e) = socket.send(Message::Text(json.into())).await {
            warn!("ws send failed: {}", e);
            return;
        }

        seq += 1;
    }

    // 🔚 END FLAG
    let end_payload = LeadPayload {
        timestamp: 0.0,
        value: 0.0,
        desc: label.to_string(),
        seq,
        end_flag: true,
    };

    if let Ok(json) = serde_json::to_string(&end_payload) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    info!("ws_fetch finished: {}", lead_name);
}
