// Main ISHNE reader implementation

use crate::core::constants::*;
use crate::core::error::{IshneError, Result};
use crate::core::export::{export, ChunkSink};
use crate::core::format::*;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Decodes the fixed 434-byte header region of an ISHNE 1.0 file.
///
/// The buffer only needs to cover the fixed header; a header-only prefix
/// of a file parses fine. Whether the ECG block fits the buffer is checked
/// at decode time, not here.
pub fn parse_header(buffer: &[u8]) -> Result<IshneHeader> {
    if buffer.len() < HEADER_SIZE {
        return Err(IshneError::HeaderTooShort {
            needed: HEADER_SIZE,
            got: buffer.len(),
        });
    }

    let magic = &buffer[..MAGIC.len()];
    if magic != MAGIC {
        return Err(IshneError::InvalidMagic {
            expected: MAGIC.to_vec(),
            got: magic.to_vec(),
        });
    }

    // The stored checksum at [8, 10) is skipped, never validated.
    let mut off = HEADER_START;

    let header = IshneHeader {
        var_block_size: read_u32(buffer, &mut off),
        declared_samples: read_u32(buffer, &mut off),
        var_block_offset: read_u32(buffer, &mut off),
        ecg_block_offset: read_u32(buffer, &mut off),
        file_version: read_u16(buffer, &mut off),
        first_name: read_text(buffer, &mut off, 40),
        last_name: read_text(buffer, &mut off, 40),
        subject_id: read_text(buffer, &mut off, 20),
        sex: read_u16(buffer, &mut off),
        race: read_u16(buffer, &mut off),
        birth_date: read_triple(buffer, &mut off),
        record_date: read_triple(buffer, &mut off),
        file_date: read_triple(buffer, &mut off),
        start_time: read_triple(buffer, &mut off),
        n_leads: read_u16(buffer, &mut off),
        lead_spec: read_lead_slots(buffer, &mut off),
        lead_quality: read_lead_slots(buffer, &mut off),
        resolution: read_lead_slots(buffer, &mut off),
        pacemaker: read_u16(buffer, &mut off),
        recorder: read_text(buffer, &mut off, 40),
        sampling_rate: read_u16(buffer, &mut off),
        proprietary: read_text(buffer, &mut off, 80),
        copyright: read_text(buffer, &mut off, 80),
    };

    if header.n_leads == 0 || header.n_leads as usize > LEAD_SLOTS {
        return Err(IshneError::InvalidLeadCount(header.n_leads));
    }
    if header.sampling_rate == 0 {
        return Err(IshneError::InvalidSamplingRate(header.sampling_rate));
    }

    Ok(header)
}

/// Demultiplexes the ECG block into one amplitude vector per lead.
///
/// How many samples each lead gets is decided by the buffer, not the
/// header: `available / (2 * n_leads)`, floored. A disagreement with the
/// declared count is reported as a `warn` event and decoding proceeds
/// with the buffer-derived count.
pub fn decode_samples(buffer: &[u8], header: &IshneHeader) -> Result<SampleSet> {
    let n_leads = header.n_leads as usize;
    if n_leads == 0 {
        // Guard before the division below; parse never lets this through,
        // but header fields are public.
        return Err(IshneError::InvalidLeadCount(header.n_leads));
    }

    let ecg_offset = header.ecg_block_offset as usize;
    if ecg_offset > buffer.len() {
        return Err(IshneError::EcgBlockOutOfBounds {
            offset: ecg_offset,
            len: buffer.len(),
        });
    }

    let available = buffer.len() - ecg_offset;
    let actual = available / (BYTES_PER_SAMPLE * n_leads);

    let declared = header.declared_samples as usize;
    if actual != declared {
        warn!(declared, actual, "declared sample count disagrees with buffer size");
    }

    // Sample-major, lead-minor: all leads of time step s sit together.
    let mut set = SampleSet::with_dims(n_leads, actual);
    let mut off = ecg_offset;
    for _ in 0..actual {
        for lead in set.leads.iter_mut() {
            lead.push(i16::from_le_bytes([buffer[off], buffer[off + 1]]));
            off += BYTES_PER_SAMPLE;
        }
    }

    Ok(set)
}

/// Derives the declared-vs-actual diagnostic view of a recording.
/// Pure computation, no events, no side effects.
pub fn summarize(buffer: &[u8], header: &IshneHeader) -> RecordingSummary {
    let n_leads = header.n_leads as usize;
    let ecg_offset = header.ecg_block_offset as usize;

    let available = buffer.len().saturating_sub(ecg_offset);
    let actual = if n_leads == 0 {
        0
    } else {
        (available / (BYTES_PER_SAMPLE * n_leads)) as u64
    };

    let rate = f64::from(header.sampling_rate);
    let declared = header.declared_samples;

    RecordingSummary {
        n_leads: header.n_leads,
        sampling_rate: header.sampling_rate,
        declared_samples_per_lead: declared,
        actual_samples_per_lead: actual,
        declared_duration_secs: f64::from(declared) / rate,
        actual_duration_secs: actual as f64 / rate,
        declared_ecg_bytes: u64::from(declared) * (BYTES_PER_SAMPLE * n_leads) as u64,
        actual_ecg_bytes: available as u64,
        resolutions: header.active_resolutions().to_vec(),
    }
}

fn read_u16(buf: &[u8], off: &mut usize) -> u16 {
    let v = u16::from_le_bytes([buf[*off], buf[*off + 1]]);
    *off += 2;
    v
}

fn read_i16(buf: &[u8], off: &mut usize) -> i16 {
    let v = i16::from_le_bytes([buf[*off], buf[*off + 1]]);
    *off += 2;
    v
}

fn read_u32(buf: &[u8], off: &mut usize) -> u32 {
    let v = u32::from_le_bytes([buf[*off], buf[*off + 1], buf[*off + 2], buf[*off + 3]]);
    *off += 4;
    v
}

// Fixed-width ASCII field. Only trailing NULs are stripped; trailing
// blanks are part of the stored value.
fn read_text(buf: &[u8], off: &mut usize, width: usize) -> String {
    let field = &buf[*off..*off + width];
    *off += width;
    String::from_utf8_lossy(field)
        .trim_end_matches('\0')
        .to_string()
}

fn read_triple(buf: &[u8], off: &mut usize) -> [u16; 3] {
    [read_u16(buf, off), read_u16(buf, off), read_u16(buf, off)]
}

fn read_lead_slots(buf: &[u8], off: &mut usize) -> [i16; LEAD_SLOTS] {
    let mut slots = [0i16; LEAD_SLOTS];
    for slot in slots.iter_mut() {
        *slot = read_i16(buf, off);
    }
    slots
}

/// Stateful reader over one in-memory ISHNE file.
///
/// Holds the whole buffer plus the parsed header, nothing else; samples
/// are decoded fresh on every call. Immutable once the header is parsed,
/// so an `Arc<IshneReader>` can be shared across tasks without a lock.
pub struct IshneReader {
    path: Option<PathBuf>,
    buffer: Vec<u8>,
    header: Option<IshneHeader>,
}

impl IshneReader {
    /// Wraps a buffer without looking at it; `parse_header` is explicit.
    pub fn new(buffer: Vec<u8>) -> Self {
        Self {
            path: None,
            buffer,
            header: None,
        }
    }

    /// Wraps a buffer and parses the fixed header eagerly.
    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self> {
        let mut reader = Self::new(buffer);
        reader.parse_header()?;
        Ok(reader)
    }

    /// Reads the whole file into memory and parses the fixed header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let buffer = std::fs::read(&path)?;
        let mut reader = Self::from_bytes(buffer)?;
        reader.path = Some(path);
        Ok(reader)
    }

    /// Parses the header if it has not been parsed yet. Idempotent: the
    /// same bytes always produce the same header, so a second call just
    /// returns the stored one.
    pub fn parse_header(&mut self) -> Result<&IshneHeader> {
        if self.header.is_none() {
            self.header = Some(parse_header(&self.buffer)?);
        }
        self.header()
    }

    pub fn header(&self) -> Result<&IshneHeader> {
        self.header.as_ref().ok_or(IshneError::HeaderNotParsed)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Demultiplexes the ECG block; see [`decode_samples`]. The result is
    /// owned by the caller and never cached.
    pub fn decode_samples(&self) -> Result<SampleSet> {
        let header = self.header()?;
        decode_samples(&self.buffer, header)
    }

    pub fn summary(&self) -> Result<RecordingSummary> {
        let header = self.header()?;
        Ok(summarize(&self.buffer, header))
    }

    /// Decodes a fresh sample set and streams it into `sink` in the given
    /// format. See [`export`] for the write-loop contract.
    pub async fn export<S: ChunkSink>(
        &self,
        format: ExportFormat,
        options: &ExportOptions,
        sink: S,
    ) -> Result<()> {
        let header = self.header()?;
        let samples = decode_samples(&self.buffer, header)?;
        export(header, &samples, format, options, sink).await
    }

    pub async fn export_to_json<S: ChunkSink>(
        &self,
        options: &ExportOptions,
        sink: S,
    ) -> Result<()> {
        self.export(ExportFormat::Json, options, sink).await
    }

    pub async fn export_to_csv<S: ChunkSink>(
        &self,
        options: &ExportOptions,
        sink: S,
    ) -> Result<()> {
        self.export(ExportFormat::Csv, options, sink).await
    }

    /// CSV with the separator forced to a tab.
    pub async fn export_to_text<S: ChunkSink>(
        &self,
        options: &ExportOptions,
        sink: S,
    ) -> Result<()> {
        self.export(ExportFormat::Text, options, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::test_support::*;

    #[test]
    fn parses_every_fixed_field() {
        let mut spec = FileSpec::two_lead();
        spec.first_name = "MARY".into();
        spec.last_name = "WALKER".into();
        spec.subject_id = "H-0042".into();
        spec.sex = 2;
        spec.race = 1;
        spec.birth_date = [1961, 7, 9];
        spec.record_date = [2024, 3, 15];
        spec.file_date = [2024, 3, 16];
        spec.start_time = [13, 45, 30];
        spec.pacemaker = 1;
        spec.recorder = "HolterOne".into();
        spec.proprietary = "site A".into();
        spec.copyright = "(c) clinic".into();

        let buffer = spec.build();
        let header = parse_header(&buffer).unwrap();

        assert_eq!(header.var_block_size, 0);
        assert_eq!(header.declared_samples, spec.declared_samples);
        assert_eq!(header.ecg_block_offset, spec.ecg_block_offset);
        assert_eq!(header.file_version, 1);
        assert_eq!(header.first_name, "MARY");
        assert_eq!(header.last_name, "WALKER");
        assert_eq!(header.subject_id, "H-0042");
        assert_eq!(header.sex, 2);
        assert_eq!(header.race, 1);
        assert_eq!(header.birth_date, [1961, 7, 9]);
        assert_eq!(header.record_date, [2024, 3, 15]);
        assert_eq!(header.file_date, [2024, 3, 16]);
        assert_eq!(header.start_time, [13, 45, 30]);
        assert_eq!(header.n_leads, 2);
        assert_eq!(&header.lead_spec[..2], &[2, 3]);
        assert_eq!(&header.resolution[..2], &[200, 200]);
        assert_eq!(header.pacemaker, 1);
        assert_eq!(header.recorder, "HolterOne");
        assert_eq!(header.sampling_rate, 250);
        assert_eq!(header.proprietary, "site A");
        assert_eq!(header.copyright, "(c) clinic");
    }

    #[test]
    fn parse_is_idempotent() {
        let buffer = FileSpec::two_lead().build();
        let first = parse_header(&buffer).unwrap();
        let second = parse_header(&buffer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buffer = FileSpec::two_lead().build();
        buffer[7] = b'9'; // "ISHNE1.9"
        match parse_header(&buffer) {
            Err(IshneError::InvalidMagic { expected, got }) => {
                assert_eq!(expected, MAGIC.to_vec());
                assert_eq!(got, b"ISHNE1.9".to_vec());
            }
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn rejects_short_buffer() {
        let buffer = FileSpec::two_lead().build();
        let err = parse_header(&buffer[..HEADER_SIZE - 1]).unwrap_err();
        match err {
            IshneError::HeaderTooShort { needed, got } => {
                assert_eq!(needed, HEADER_SIZE);
                assert_eq!(got, HEADER_SIZE - 1);
            }
            other => panic!("expected HeaderTooShort, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn rejects_invalid_lead_counts() {
        for bad in [0u16, 13, 200] {
            let mut spec = FileSpec::two_lead();
            spec.n_leads = bad;
            let err = parse_header(&spec.build()).unwrap_err();
            assert!(matches!(err, IshneError::InvalidLeadCount(n) if n == bad));
        }
    }

    #[test]
    fn rejects_zero_sampling_rate() {
        let mut spec = FileSpec::two_lead();
        spec.sampling_rate = 0;
        let err = parse_header(&spec.build()).unwrap_err();
        assert!(matches!(err, IshneError::InvalidSamplingRate(0)));
    }

    // The legacy variant of this format trimmed whitespace too; the
    // authoritative layout strips trailing NULs only, so stored blanks
    // survive the round trip.
    #[test]
    fn trailing_nuls_stripped_spaces_kept() {
        let mut spec = FileSpec::two_lead();
        spec.first_name = "JO  ".into();
        let header = parse_header(&spec.build()).unwrap();
        assert_eq!(header.first_name, "JO  ");
    }

    #[test]
    fn demultiplexes_sample_major_lead_minor() {
        let spec = FileSpec::two_lead()
            .with_samples(&[&[10, 20, 30], &[-10, -20, -30]]);
        let buffer = spec.build();
        let header = parse_header(&buffer).unwrap();
        let set = decode_samples(&buffer, &header).unwrap();

        assert_eq!(set.lead_count(), 2);
        assert_eq!(set.leads[0], vec![10, 20, 30]);
        assert_eq!(set.leads[1], vec![-10, -20, -30]);
    }

    #[test]
    fn actual_count_comes_from_buffer_not_header() {
        // Header claims 1000 samples per lead, the buffer carries 3.
        let mut spec = FileSpec::two_lead()
            .with_samples(&[&[1, 2, 3], &[4, 5, 6]]);
        spec.declared_samples = 1000;
        let buffer = spec.build();
        let header = parse_header(&buffer).unwrap();

        let set = decode_samples(&buffer, &header).unwrap();
        assert_eq!(set.samples_per_lead(), 3);
        assert_eq!(header.declared_samples, 1000);
    }

    #[test]
    fn actual_count_floors_partial_sample_rows() {
        // (buffer_len - offset) / (2 * n_leads), floored; stray bytes past
        // the last full row never count, a full extra row does.
        for extra in 0..6usize {
            let spec = FileSpec::two_lead()
                .with_samples(&[&[7, 7], &[7, 7]]);
            let mut buffer = spec.build();
            buffer.extend(std::iter::repeat(0xAA).take(extra));

            let header = parse_header(&buffer).unwrap();
            let set = decode_samples(&buffer, &header).unwrap();

            let available = buffer.len() - header.ecg_block_offset as usize;
            assert_eq!(set.samples_per_lead(), available / 4);
            assert_eq!(set.samples_per_lead(), 2 + extra / 4);
        }
    }

    #[test]
    fn decode_rejects_offset_beyond_buffer() {
        let mut spec = FileSpec::two_lead();
        spec.ecg_block_offset = 100_000;
        let buffer = spec.build_header_only();
        let header = parse_header(&buffer).unwrap();

        let err = decode_samples(&buffer, &header).unwrap_err();
        assert!(matches!(err, IshneError::EcgBlockOutOfBounds { .. }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn decode_guards_hand_built_zero_lead_header() {
        let buffer = FileSpec::two_lead().build();
        let mut header = parse_header(&buffer).unwrap();
        header.n_leads = 0;

        let err = decode_samples(&buffer, &header).unwrap_err();
        assert!(matches!(err, IshneError::InvalidLeadCount(0)));
    }

    #[test]
    fn empty_ecg_block_decodes_to_empty_leads() {
        // Buffer ends exactly where the ECG block begins.
        let spec = FileSpec::two_lead();
        let buffer = spec.build();
        let header = parse_header(&buffer).unwrap();

        let set = decode_samples(&buffer, &header).unwrap();
        assert_eq!(set.lead_count(), 2);
        assert!(set.is_empty());
    }

    #[test]
    fn summary_reports_declared_and_actual() {
        let mut spec = FileSpec::two_lead()
            .with_samples(&[&[1, 2], &[3, 4]]);
        spec.declared_samples = 500;
        let buffer = spec.build();
        let header = parse_header(&buffer).unwrap();

        let summary = summarize(&buffer, &header);
        assert_eq!(summary.n_leads, 2);
        assert_eq!(summary.sampling_rate, 250);
        assert_eq!(summary.declared_samples_per_lead, 500);
        assert_eq!(summary.actual_samples_per_lead, 2);
        assert_eq!(summary.declared_duration_secs, 500.0 / 250.0);
        assert_eq!(summary.actual_duration_secs, 2.0 / 250.0);
        assert_eq!(summary.declared_ecg_bytes, 500 * 4);
        assert_eq!(summary.actual_ecg_bytes, 8);
        assert_eq!(summary.resolutions, vec![200, 200]);
    }

    #[test]
    fn reader_requires_parsed_header() {
        let buffer = FileSpec::two_lead().build();
        let reader = IshneReader::new(buffer);

        let err = reader.decode_samples().unwrap_err();
        assert!(matches!(err, IshneError::HeaderNotParsed));
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(reader.summary().is_err());
    }

    #[test]
    fn reader_parse_is_explicit_and_idempotent() {
        let buffer = FileSpec::two_lead()
            .with_samples(&[&[5], &[6]])
            .build();
        let mut reader = IshneReader::new(buffer);

        let first = reader.parse_header().unwrap().clone();
        let second = reader.parse_header().unwrap().clone();
        assert_eq!(first, second);

        let set = reader.decode_samples().unwrap();
        assert_eq!(set.leads[0], vec![5]);
        assert_eq!(set.leads[1], vec![6]);
    }

    #[test]
    fn from_bytes_parses_eagerly() {
        let buffer = FileSpec::two_lead().build();
        let reader = IshneReader::from_bytes(buffer).unwrap();
        assert_eq!(reader.header().unwrap().n_leads, 2);
        assert!(reader.path().is_none());
    }

    #[test]
    fn from_bytes_surfaces_parse_failures() {
        // match instead of unwrap_err: the reader itself carries no Debug
        let err = match IshneReader::from_bytes(b"not an ecg".to_vec()) {
            Ok(_) => panic!("expected a parse failure"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
