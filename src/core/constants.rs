// Byte layout constants for ISHNE 1.0 Holter files

pub const MAGIC: &[u8; 8] = b"ISHNE1.0";

// A 16-bit checksum over the header sits right after the magic. Every file
// carries it but this reader never validates it (out of scope).
pub const CHECKSUM_SIZE: usize = 2;

// First fixed header field starts after magic + stored checksum
pub const HEADER_START: usize = MAGIC.len() + CHECKSUM_SIZE; // 10

// Defined fixed-header content, offsets measured from HEADER_START:
//   var_block_size(u32) declared_samples(u32) var_block_offset(u32)
//   ecg_block_offset(u32) file_version(u16)                      -> 18
//   first_name(40) last_name(40) subject_id(20)                  -> 100
//   sex(u16) race(u16)                                           -> 4
//   birth_date(3xu16) record_date(3xu16) file_date(3xu16)
//   start_time(3xu16)                                            -> 24
//   n_leads(u16) lead_spec(12xi16) lead_quality(12xi16)
//   resolution(12xi16) pacemaker(u16)                            -> 76
//   recorder(40) sampling_rate(u16)                              -> 42
//   proprietary(80) copyright(80)                                -> 160
pub const FIXED_HEADER_LEN: usize = 18 + 100 + 4 + 24 + 76 + 42 + 160; // 424

// Minimum buffer a header parse accepts
pub const HEADER_SIZE: usize = HEADER_START + FIXED_HEADER_LEN; // 434

// Lead-indexed header arrays always carry 12 slots, used or not
pub const LEAD_SLOTS: usize = 12;

// ECG block amplitudes are little-endian i16, multiplexed lead by lead
pub const BYTES_PER_SAMPLE: usize = 2;

// Per-lead resolution is stored in nanovolt units; raw * resolution
// divided by this gives millivolts
pub const NANOVOLTS_PER_MILLIVOLT: f64 = 1_000_000.0;
