// Streaming export of decoded recordings to JSON / CSV / tab text

use crate::core::constants::NANOVOLTS_PER_MILLIVOLT;
use crate::core::error::Result;
use crate::core::format::{ExportFormat, ExportOptions, IshneHeader, SampleSet};
use serde_json::json;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Upper bound on scaled values per JSON fragment, so no whole lead array
/// is ever materialized as one string.
pub const VALUES_PER_CHUNK: usize = 1024;

// An f64 resolves at most 17 significant decimal digits; a larger request
// (decimal_places comes unchecked off the export route's query string)
// would overflow the 10^n scale factor to infinity and turn every value
// into NaN.
const MAX_DECIMAL_PLACES: usize = 17;

/// Raw amplitude to millivolts via the per-lead gain (nanovolt units).
pub fn scale_to_millivolts(raw: i16, resolution: i16) -> f64 {
    f64::from(raw) * f64::from(resolution) / NANOVOLTS_PER_MILLIVOLT
}

/// Round half away from zero at `decimal_places`, clamped to the precision
/// an f64 can hold.
pub fn round_to(value: f64, decimal_places: usize) -> f64 {
    let factor = 10f64.powi(decimal_places.min(MAX_DECIMAL_PLACES) as i32);
    (value * factor).round() / factor
}

fn fmt_rounded(value: f64, decimal_places: usize) -> String {
    let decimal_places = decimal_places.min(MAX_DECIMAL_PLACES);
    format!("{:.*}", decimal_places, round_to(value, decimal_places))
}

/// Destination for streamed export fragments. May fail on any write;
/// `close` flushes whatever the implementation buffers.
#[allow(async_fn_in_trait)]
pub trait ChunkSink {
    async fn write_chunk(&mut self, chunk: &str) -> io::Result<()>;
    async fn close(&mut self) -> io::Result<()>;
}

impl<S: ChunkSink> ChunkSink for &mut S {
    async fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        (**self).write_chunk(chunk).await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }
}

/// Sink over anything `AsyncWrite`: files, sockets, `Vec<u8>`.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: AsyncWrite + Unpin> ChunkSink for WriterSink<W> {
    async fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        self.writer.write_all(chunk.as_bytes()).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

/// In-memory sink; the export route answers requests out of one.
#[derive(Debug, Default)]
pub struct StringSink {
    buffer: String,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl ChunkSink for StringSink {
    async fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        self.buffer.push_str(chunk);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drives one export: produce fragments lazily, write each to the sink,
/// stop at the first failed write (the producer is simply not advanced
/// again), close on success. The sink is dropped on every exit path.
pub async fn export<S: ChunkSink>(
    header: &IshneHeader,
    samples: &SampleSet,
    format: ExportFormat,
    options: &ExportOptions,
    mut sink: S,
) -> Result<()> {
    let chunks = ExportChunks::new(header, samples, format, options);
    for chunk in chunks {
        sink.write_chunk(&chunk).await?;
    }
    sink.close().await?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Stage {
    CsvHeader,
    CsvRow(usize),
    JsonPrologue,
    JsonTimeRun(usize),
    JsonLeadOpen(usize),
    JsonLeadRun { lead: usize, pos: usize },
    Done,
}

/// Lazy, finite, single-pass fragment sequence over one decoded
/// recording. CSV/Text yield one fragment per row; JSON yields structural
/// fragments plus bounded runs of values.
///
/// `samples` must come from a decode against the same header, so lead
/// count and resolution slots line up.
pub struct ExportChunks<'a> {
    header: &'a IshneHeader,
    samples: &'a SampleSet,
    options: &'a ExportOptions,
    separator: String,
    stage: Stage,
}

impl<'a> ExportChunks<'a> {
    pub fn new(
        header: &'a IshneHeader,
        samples: &'a SampleSet,
        format: ExportFormat,
        options: &'a ExportOptions,
    ) -> Self {
        // Text is CSV with the separator pinned to a tab.
        let separator = match format {
            ExportFormat::Text => "\t".to_string(),
            _ => options.separator.clone(),
        };
        let stage = match format {
            ExportFormat::Json => Stage::JsonPrologue,
            ExportFormat::Csv | ExportFormat::Text => Stage::CsvHeader,
        };

        Self {
            header,
            samples,
            options,
            separator,
            stage,
        }
    }

    fn fmt_time(&self, index: usize) -> String {
        let secs = index as f64 / f64::from(self.header.sampling_rate);
        fmt_rounded(secs, self.options.decimal_places)
    }

    fn csv_header_row(&self) -> String {
        let mut cols = Vec::with_capacity(self.samples.lead_count() + 1);
        if self.options.time_column {
            cols.push("Time(s)".to_string());
        }
        for lead in 0..self.samples.lead_count() {
            cols.push(format!("Lead{}(mV)", lead + 1));
        }
        let mut row = cols.join(&self.separator);
        row.push('\n');
        row
    }

    fn csv_row(&self, index: usize) -> String {
        let mut cols = Vec::with_capacity(self.samples.lead_count() + 1);
        if self.options.time_column {
            cols.push(self.fmt_time(index));
        }
        for (lead, values) in self.samples.leads.iter().enumerate() {
            let mv = scale_to_millivolts(values[index], self.header.resolution[lead]);
            cols.push(fmt_rounded(mv, self.options.decimal_places));
        }
        let mut row = cols.join(&self.separator);
        row.push('\n');
        row
    }

    // Run of time values [start, end), comma placement by absolute index.
    fn time_run(&self, start: usize) -> (String, usize) {
        let end = (start + VALUES_PER_CHUNK).min(self.samples.samples_per_lead());
        let mut out = String::new();
        for i in start..end {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&self.fmt_time(i));
        }
        (out, end)
    }

    fn lead_run(&self, lead: usize, start: usize) -> (String, usize) {
        let values = &self.samples.leads[lead];
        let resolution = self.header.resolution[lead];
        let end = (start + VALUES_PER_CHUNK).min(values.len());
        let mut out = String::new();
        for i in start..end {
            if i > 0 {
                out.push(',');
            }
            let mv = scale_to_millivolts(values[i], resolution);
            out.push_str(&fmt_rounded(mv, self.options.decimal_places));
        }
        (out, end)
    }
}

impl Iterator for ExportChunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            match self.stage {
                Stage::CsvHeader => {
                    self.stage = Stage::CsvRow(0);
                    if self.options.include_header {
                        return Some(self.csv_header_row());
                    }
                }
                Stage::CsvRow(index) => {
                    if index < self.samples.samples_per_lead() {
                        self.stage = Stage::CsvRow(index + 1);
                        return Some(self.csv_row(index));
                    }
                    self.stage = Stage::Done;
                }
                Stage::JsonPrologue => {
                    let metadata = metadata_value(self.header, self.samples.samples_per_lead());
                    let mut frag = format!("{{\"metadata\":{},\"data\":{{", metadata);
                    if self.options.time_column {
                        frag.push_str("\"time\":[");
                        self.stage = Stage::JsonTimeRun(0);
                    } else {
                        frag.push_str("\"leads\":[");
                        self.stage = Stage::JsonLeadOpen(0);
                    }
                    return Some(frag);
                }
                Stage::JsonTimeRun(pos) => {
                    if pos < self.samples.samples_per_lead() {
                        let (frag, end) = self.time_run(pos);
                        self.stage = Stage::JsonTimeRun(end);
                        return Some(frag);
                    }
                    self.stage = Stage::JsonLeadOpen(0);
                    return Some("],\"leads\":[".to_string());
                }
                Stage::JsonLeadOpen(lead) => {
                    if lead < self.samples.lead_count() {
                        self.stage = Stage::JsonLeadRun { lead, pos: 0 };
                        return Some(if lead == 0 { "[" } else { "],[" }.to_string());
                    }
                    self.stage = Stage::Done;
                    let close = if self.samples.lead_count() == 0 {
                        "]}}"
                    } else {
                        "]]}}"
                    };
                    return Some(close.to_string());
                }
                Stage::JsonLeadRun { lead, pos } => {
                    if pos < self.samples.leads[lead].len() {
                        let (frag, end) = self.lead_run(lead, pos);
                        self.stage = Stage::JsonLeadRun { lead, pos: end };
                        return Some(frag);
                    }
                    // exhausted lead yields nothing, move to the next one
                    self.stage = Stage::JsonLeadOpen(lead + 1);
                }
                Stage::Done => return None,
            }
        }
    }
}

fn metadata_value(header: &IshneHeader, samples_per_lead: usize) -> serde_json::Value {
    json!({
        "patientInfo": {
            "id": header.subject_id,
            "firstName": header.first_name,
            "lastName": header.last_name,
            "sex": header.sex,
            "race": header.race,
            "birthDate": header.birth_date_iso(),
        },
        "recordInfo": {
            "date": header.record_date_iso(),
            "startTime": header.start_time_iso(),
            "samplingRate": header.sampling_rate,
            "numberOfLeads": header.n_leads,
            "leadResolutions": header.active_resolutions(),
            "duration": samples_per_lead as f64 / f64::from(header.sampling_rate),
        },
        "technical": {
            "fileVersion": header.file_version,
            "pacemaker": header.pacemaker,
            "recorder": header.recorder,
        },
    })
}
