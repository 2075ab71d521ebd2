// Synthetic ISHNE buffers for the core tests. The builder writes fields
// at the absolute offsets of the layout table, independently of the
// reader's cursor, so it doubles as a check of the offsets themselves.

use crate::core::constants::*;

pub struct FileSpec {
    pub var_block_size: u32,
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
    pub lead_spec: [i16; LEAD_SLOTS],
    pub lead_quality: [i16; LEAD_SLOTS],
    pub resolution: [i16; LEAD_SLOTS],
    pub pacemaker: u16,
    pub recorder: String,
    pub sampling_rate: u16,
    pub proprietary: String,
    pub copyright: String,
    /// Per-lead raw amplitudes, interleaved by `build`.
    pub samples: Vec<Vec<i16>>,
}

impl FileSpec {
    /// Two leads (X, Y) at 250 Hz, ECG block at byte 600, resolution
    /// 200 nV per count. No samples until `with_samples`.
    pub fn two_lead() -> Self {
        let mut lead_spec = [0i16; LEAD_SLOTS];
        lead_spec[0] = 2;
        lead_spec[1] = 3;
        let mut resolution = [0i16; LEAD_SLOTS];
        resolution[0] = 200;
        resolution[1] = 200;

        Self {
            var_block_size: 0,
            declared_samples: 0,
            var_block_offset: 0,
            ecg_block_offset: 600,
            file_version: 1,
            first_name: String::new(),
            last_name: String::new(),
            subject_id: String::new(),
            sex: 0,
            race: 0,
            birth_date: [0, 0, 0],
            record_date: [0, 0, 0],
            file_date: [0, 0, 0],
            start_time: [0, 0, 0],
            n_leads: 2,
            lead_spec,
            lead_quality: [0; LEAD_SLOTS],
            resolution,
            pacemaker: 0,
            recorder: String::new(),
            sampling_rate: 250,
            proprietary: String::new(),
            copyright: String::new(),
            samples: Vec::new(),
        }
    }

    /// Sets the per-lead samples and makes the declared count agree with
    /// them. Tests that want a mismatch override `declared_samples` after.
    pub fn with_samples(mut self, leads: &[&[i16]]) -> Self {
        self.samples = leads.iter().map(|lead| lead.to_vec()).collect();
        self.declared_samples = leads.first().map_or(0, |lead| lead.len()) as u32;
        self
    }

    /// Full file: fixed header, zero padding up to the ECG offset, then
    /// the interleaved sample block.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = self.build_header_only();
        buf.resize((self.ecg_block_offset as usize).max(HEADER_SIZE), 0);

        let per_lead = self.samples.iter().map(Vec::len).max().unwrap_or(0);
        for s in 0..per_lead {
            for lead in &self.samples {
                let v = lead.get(s).copied().unwrap_or(0);
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }

    /// Just the fixed header region, nothing after byte 434.
    pub fn build_header_only(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..MAGIC.len()].copy_from_slice(MAGIC);
        // stored checksum at [8, 10) stays zero, the reader skips it

        let h = HEADER_START;
        put_u32(&mut buf, h, self.var_block_size);
        put_u32(&mut buf, h + 4, self.declared_samples);
        put_u32(&mut buf, h + 8, self.var_block_offset);
        put_u32(&mut buf, h + 12, self.ecg_block_offset);
        put_u16(&mut buf, h + 16, self.file_version);
        put_text(&mut buf, h + 18, 40, &self.first_name);
        put_text(&mut buf, h + 58, 40, &self.last_name);
        put_text(&mut buf, h + 98, 20, &self.subject_id);
        put_u16(&mut buf, h + 118, self.sex);
        put_u16(&mut buf, h + 120, self.race);
        put_triple(&mut buf, h + 122, self.birth_date);
        put_triple(&mut buf, h + 128, self.record_date);
        put_triple(&mut buf, h + 134, self.file_date);
        put_triple(&mut buf, h + 140, self.start_time);
        put_u16(&mut buf, h + 146, self.n_leads);
        put_lead_slots(&mut buf, h + 148, &self.lead_spec);
        put_lead_slots(&mut buf, h + 172, &self.lead_quality);
        put_lead_slots(&mut buf, h + 196, &self.resolution);
        put_u16(&mut buf, h + 220, self.pacemaker);
        put_text(&mut buf, h + 222, 40, &self.recorder);
        put_u16(&mut buf, h + 262, self.sampling_rate);
        put_text(&mut buf, h + 264, 80, &self.proprietary);
        put_text(&mut buf, h + 344, 80, &self.copyright);
        buf
    }
}

fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_i16(buf: &mut [u8], off: usize, v: i16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_triple(buf: &mut [u8], off: usize, triple: [u16; 3]) {
    for (i, v) in triple.iter().enumerate() {
        put_u16(buf, off + i * 2, *v);
    }
}

fn put_lead_slots(buf: &mut [u8], off: usize, slots: &[i16; LEAD_SLOTS]) {
    for (i, v) in slots.iter().enumerate() {
        put_i16(buf, off + i * 2, *v);
    }
}

fn put_text(buf: &mut [u8], off: usize, width: usize, s: &str) {
    let bytes = s.as_bytes();
    assert!(bytes.len() <= width, "text field overflows its {width} bytes");
    buf[off..off + bytes.len()].copy_from_slice(bytes);
}
