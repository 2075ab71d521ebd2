use axum::{
    routing::{get, post},
    Router,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
    extract::{
        Path,
        Query,
        State,
        ws::WebSocketUpgrade,
    },
};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, debug, error};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::state::app_state::{AppState, LeadEntry};
use ishne_reader::{
    handle_ws_fetch, lead_label, ErrorKind, ExportFormat, ExportOptions, IshneError, IshneReader,
    StringSink,
};

/// One recording in GET /recordings: its id plus the exposed lead names
/// and their designations from the file, index-aligned.
#[derive(Serialize)]
pub struct RecordingOverview {
    pub id: String,
    pub leads_count: usize,
    pub leads: Vec<String>,
    pub designations: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct FileReadRequest {
    pub mode: String, // "online" | "offline"
    pub path: String,
}

/// Answer shape the Plotune core expects from read-file.
#[derive(Serialize, Debug)]
pub struct FileReadResponse {
    pub id: String,
    pub name: String,
    pub path: String,
    pub source: String,
    pub headers: Option<Vec<String>>,
    pub desc: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created_at: Option<String>,
    pub source_url: Option<String>,
}


/// =======================
/// ROUTER
/// =======================

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/read-file", post(read_file))
        .route("/fetch/{:lead}", get(ws_fetch))
        .route("/recordings", get(list_recordings))
        .route("/recordings/{:id}/summary", get(recording_summary))
        .route("/recordings/{:id}/export/{:format}", get(recording_export))
        .with_state(state)
}

/// Error kinds map onto statuses: malformed file is the client's fault,
/// a missing header is ours, a dead source or sink is upstream's.
fn error_status(err: &IshneError) -> StatusCode {
    match err.kind() {
        ErrorKind::Format => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::State => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Io => StatusCode::BAD_GATEWAY,
    }
}

async fn find_reader(state: &AppState, recording_id: &str) -> Option<Arc<IshneReader>> {
    let leads = state.leads.read().await;
    leads
        .values()
        .find(|entry| entry.recording_id == recording_id)
        .map(|entry| entry.reader.clone())
}


/// =======================
/// HANDLERS
/// =======================

async fn read_file(
    State(state): State<AppState>,
    Json(request): Json<FileReadRequest>,
) -> Response {
    debug!("Reading file: mode={}, path={}", request.mode, request.path);

    // Open once; the reader is immutable from here on.
    let reader = match IshneReader::open(&request.path) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("Failed to open file {}: {}", request.path, e);
            return error_status(&e).into_response();
        }
    };

    let header = match reader.header() {
        Ok(h) => h,
        Err(e) => return error_status(&e).into_response(),
    };

    let recording_id = Uuid::new_v4().to_string();
    let mut exposed_leads = Vec::with_capacity(header.n_leads as usize);
    let mut leads = state.leads.write().await;

    for index in 0..header.n_leads as usize {
        let base_name = format!("Lead{}", index + 1);
        let mut final_name = base_name.clone();

        // 👇 GLOBAL UNIQUE NAME
        if leads.contains_key(&final_name) {
            let mut i = 1;
            loop {
                let candidate = format!("{}_{}", base_name, i);
                if !leads.contains_key(&candidate) {
                    final_name = candidate;
                    break;
                }
                i += 1;
            }
        }

        let label = lead_label(header.lead_spec[index]);
        info!("Register lead: {} ({}) in {}", final_name, label, recording_id);

        leads.insert(
            final_name.clone(),
            LeadEntry {
                reader: reader.clone(),
                recording_id: recording_id.clone(),
                lead_index: index,
                original_name: label.to_string(),
            },
        );

        exposed_leads.push(final_name);
    }

    let file_name = request
        .path
        .rsplit('/')
        .next()
        .unwrap_or("unknown")
        .to_string();

    Json(FileReadResponse {
        id: recording_id,
        name: file_name,
        path: request.path.clone(),
        source: request.path,
        headers: Some(exposed_leads),
        desc: Some(format!(
            "{} leads @ {} Hz",
            header.n_leads, header.sampling_rate
        )),
        tags: None,
        created_at: header.record_date_iso(),
        source_url: None,
    })
    .into_response()
}


async fn ws_fetch(
    State(state): State<AppState>,
    Path(lead_name): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let entry = {
        let leads = state.leads.read().await;
        leads.get(&lead_name).cloned()
    };

    let entry = match entry {
        Some(entry) => entry,
        None => {
            error!("Lead not found: {}", lead_name);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    ws.on_upgrade(move |socket| {
        handle_ws_fetch(socket, entry.reader, entry.lead_index, lead_name)
    })
}


async fn list_recordings(
    State(state): State<AppState>,
) -> Json<Vec<RecordingOverview>> {
    let leads = state.leads.read().await;

    // Group (exposed name, designation) pairs by recording id
    let mut groups: HashMap<String, Vec<(String, String)>> = HashMap::new();
    for (exposed, entry) in leads.iter() {
        groups
            .entry(entry.recording_id.clone())
            .or_default()
            .push((exposed.clone(), entry.original_name.clone()));
    }

    let mut out: Vec<RecordingOverview> = Vec::with_capacity(groups.len());
    for (id, mut pairs) in groups {
        pairs.sort();
        let (names, designations): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        out.push(RecordingOverview {
            id,
            leads_count: names.len(),
            leads: names,
            designations,
        });
    }

    Json(out)
}


async fn recording_summary(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Response {
    let reader = match find_reader(&state, &recording_id).await {
        Some(reader) => reader,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    match reader.summary() {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!("summary failed for {}: {}", recording_id, e);
            error_status(&e).into_response()
        }
    }
}


async fn recording_export(
    State(state): State<AppState>,
    Path((recording_id, format)): Path<(String, String)>,
    Query(options): Query<ExportOptions>,
) -> Response {
    let format = match ExportFormat::from_name(&format) {
        Some(format) => format,
        None => {
            return (StatusCode::BAD_REQUEST, "unknown export format").into_response();
        }
    };

    let reader = match find_reader(&state, &recording_id).await {
        Some(reader) => reader,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    info!("Exporting recording {} as {:?}", recording_id, format);

    let mut sink = StringSink::new();
    match reader.export(format, &options, &mut sink).await {
        Ok(()) => (
            [(header::CONTENT_TYPE, format.content_type())],
            sink.into_string(),
        )
            .into_response(),
        Err(e) => {
            error!("export failed for {}: {}", recording_id, e);
            error_status(&e).into_response()
        }
    }
}
