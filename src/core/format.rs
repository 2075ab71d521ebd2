// Data structures for the ISHNE 1.0 format

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Fixed header of one Holter recording, decoded from the first 434 bytes
/// of the file. Read-only after parsing.
///
/// Date triples are year/month/day, the start time is hour/minute/second.
/// The lead-indexed arrays always hold 12 slots; only the first `n_leads`
/// entries are meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct IshneHeader {
    pub var_block_size: u32,
    /// Samples per lead the header claims the ECG block holds. The buffer
    /// decides what is actually there; see `decode_samples`.
    pub declared_samples: u32,
    pub var_block_offset: u32,
    pub ecg_block_offset: u32,
    pub file_version: u16,
    pub first_name: String,
    pub last_name: String,
    pub subject_id: String,
    pub sex: u16,
    pub race: u16,
    pub birth_date: [u16; 3],
    pub record_date: [u16; 3],
    pub file_date: [u16; 3],
    pub start_time: [u16; 3],
    pub n_leads: u16,
    pub lead_spec: [i16; 12],
    pub lead_quality: [i16; 12],
    /// Per-lead gain in nanovolt units, used to scale raw amplitudes to mV.
    pub resolution: [i16; 12],
    pub pacemaker: u16,
    pub recorder: String,
    pub sampling_rate: u16,
    pub proprietary: String,
    pub copyright: String,
}

impl IshneHeader {
    /// Resolution entries actually in use (first `n_leads` slots).
    pub fn active_resolutions(&self) -> &[i16] {
        let n = (self.n_leads as usize).min(self.resolution.len());
        &self.resolution[..n]
    }

    /// Lead-spec codes actually in use (first `n_leads` slots).
    pub fn active_lead_specs(&self) -> &[i16] {
        let n = (self.n_leads as usize).min(self.lead_spec.len());
        &self.lead_spec[..n]
    }

    pub fn birth_date_iso(&self) -> Option<String> {
        date_iso(self.birth_date)
    }

    pub fn record_date_iso(&self) -> Option<String> {
        date_iso(self.record_date)
    }

    pub fn file_date_iso(&self) -> Option<String> {
        date_iso(self.file_date)
    }

    pub fn start_time_iso(&self) -> Option<String> {
        time_iso(self.start_time)
    }
}

// Anonymized Holter files routinely zero their date triples; those are
// not dates, so render None instead of something invented.
fn date_iso([year, month, day]: [u16; 3]) -> Option<String> {
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn time_iso([hour, minute, second]: [u16; 3]) -> Option<String> {
    NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        .map(|t| t.format("%H:%M:%S").to_string())
}

/// Lead designation for an ISHNE lead-specification code.
pub fn lead_label(code: i16) -> &'static str {
    match code {
        1 => "Generic",
        2 => "X",
        3 => "Y",
        4 => "Z",
        5 => "I",
        6 => "II",
        7 => "III",
        8 => "aVR",
        9 => "aVL",
        10 => "aVF",
        11 => "V1",
        12 => "V2",
        13 => "V3",
        14 => "V4",
        15 => "V5",
        16 => "V6",
        17 => "ES",
        18 => "AS",
        19 => "AI",
        _ => "Unknown",
    }
}

/// Demultiplexed raw amplitudes, one inner vector per lead. Produced fresh
/// by every decode call and owned by the caller; nothing is cached.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub leads: Vec<Vec<i16>>,
}

impl SampleSet {
    pub fn with_dims(n_leads: usize, samples_per_lead: usize) -> Self {
        Self {
            leads: vec![Vec::with_capacity(samples_per_lead); n_leads],
        }
    }

    pub fn lead_count(&self) -> usize {
        self.leads.len()
    }

    /// Sample count of each lead (all leads are decoded to equal length).
    pub fn samples_per_lead(&self) -> usize {
        self.leads.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.samples_per_lead() == 0
    }
}

/// Declared-vs-actual diagnostic view of a recording. Derived on demand,
/// never stored; serialized as-is by the summary route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub n_leads: u16,
    pub sampling_rate: u16,
    pub declared_samples_per_lead: u32,
    pub actual_samples_per_lead: u64,
    pub declared_duration_secs: f64,
    pub actual_duration_secs: f64,
    pub declared_ecg_bytes: u64,
    pub actual_ecg_bytes: u64,
    pub resolutions: Vec<i16>,
}

/// Export tuning knobs. Deserializes straight from the export route's
/// query string, so every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    /// Column separator for CSV. The text format ignores this and always
    /// uses a tab.
    pub separator: String,
    /// Emit the `Time(s),Lead1(mV),...` header row.
    pub include_header: bool,
    /// Emit elapsed seconds as the first column / the JSON `time` array.
    pub time_column: bool,
    /// Rounding precision for physical values.
    pub decimal_places: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            include_header: true,
            time_column: true,
            decimal_places: 2,
        }
    }
}

/// Supported export shapes. `Text` is CSV with the separator forced to a
/// tab, not a separate algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Text,
}

impl ExportFormat {
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            "text" | "txt" => Some(ExportFormat::Text),
            _ => None,
        }
    }

    /// Content type the HTTP export route answers with.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }
}
