// Example usage of the ISHNE reader

use ishne_reader::{lead_label, ExportOptions, IshneReader, Result, WriterSink};
use tracing::{info, warn, Level};
use tracing_subscriber;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/recording.ecg".to_string());

    // Open an ISHNE file (parses the fixed header eagerly)
    let reader = IshneReader::open(&path)?;
    let header = reader.header()?;

    info!("Subject: {} {} [{}]", header.first_name, header.last_name, header.subject_id);
    info!("Recorder: {} @ {} Hz", header.recorder, header.sampling_rate);
    if let Some(date) = header.record_date_iso() {
        info!("Recorded: {} {}", date, header.start_time_iso().unwrap_or_default());
    }

    info!("Leads:");
    for (i, code) in header.active_lead_specs().iter().enumerate() {
        info!(
            "  [{}] {} (resolution {} nV)",
            i + 1,
            lead_label(*code),
            header.resolution[i]
        );
    }

    // Declared vs actual, derived from the buffer
    let summary = reader.summary()?;
    info!("Samples per lead: {} declared, {} in the file",
        summary.declared_samples_per_lead, summary.actual_samples_per_lead);
    info!("Duration: {:.1}s declared, {:.1}s actual",
        summary.declared_duration_secs, summary.actual_duration_secs);
    if summary.declared_samples_per_lead as u64 != summary.actual_samples_per_lead {
        warn!("header and buffer disagree, exports follow the buffer");
    }

    // Decode and peek at the first beat's worth of raw amplitudes
    let samples = reader.decode_samples()?;
    if let Some(first_lead) = samples.leads.first() {
        let peek: Vec<i16> = first_lead.iter().take(8).copied().collect();
        info!("Lead 1 raw head: {:?}", peek);
    }

    // Stream a CSV export next to the input file
    let out_path = format!("{}.csv", path);
    let file = tokio::fs::File::create(&out_path).await?;
    reader
        .export_to_csv(&ExportOptions::default(), WriterSink::new(file))
        .await?;
    info!("CSV written to {}", out_path);

    Ok(())
}
