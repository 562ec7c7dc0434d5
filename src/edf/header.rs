//! The 256-byte EDF main header.
//!
//! Only the identification region is interpreted:
//!
//! | offset | len | field                        |
//! |--------|-----|------------------------------|
//! | 0      | 8   | version (`"0"`)              |
//! | 8      | 80  | local patient identification |
//! | 88     | 80  | local recording identification |
//! | 168    | 8   | start date `dd.mm.yy`        |
//! | 176    | 8   | start time `hh.mm.ss`        |
//!
//! The counts that follow (header bytes, records, record duration, signal
//! count) are written by [`EdfHeader::to_bytes`] from an export layout.
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

pub const HEADER_LEN: usize = 256;

const PATIENT: (usize, usize) = (8, 80);
const RECORDING: (usize, usize) = (88, 80);
const START_DATE: (usize, usize) = (168, 8);
const START_TIME: (usize, usize) = (176, 8);

/// The identification fields of an EDF header, space-padded as on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdfHeader {
    pub patient_id: String,
    pub recording_info: String,
    pub start_date: String,
    pub start_time: String,
}

impl Default for EdfHeader {
    /// The anonymised header: every identifying subfield is `X` and the start
    /// is 01.01.01 01.01.01.
    fn default() -> Self {
        Self {
            patient_id: pad("X X X X", PATIENT.1),
            recording_info: pad("Startdate X X X X", RECORDING.1),
            start_date: "01.01.01".to_string(),
            start_time: "01.01.01".to_string(),
        }
    }
}

/// Subfields of the patient identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientFields {
    pub code: String,
    /// `F`, `M` or `X`.
    pub sex: String,
    /// `None` when recorded as `X`.
    pub birthdate: Option<NaiveDate>,
    pub name: String,
    pub additional: String,
}

/// Subfields of the recording identification (after `Startdate <date>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingFields {
    pub admin_code: String,
    pub technician: String,
    pub equipment: String,
    pub additional: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderFields {
    pub patient: PatientFields,
    pub recording: RecordingFields,
    pub start: NaiveDateTime,
}

impl EdfHeader {
    /// Parse the identification region of a main header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("EDF header needs {HEADER_LEN} bytes, got {}", bytes.len());
        }
        let field = |(off, len): (usize, usize)| -> Result<String> {
            let raw = &bytes[off..off + len];
            let s = std::str::from_utf8(raw)
                .with_context(|| format!("header bytes {off}..{} are not valid text", off + len))?;
            Ok(s.to_string())
        };
        Ok(Self {
            patient_id: field(PATIENT)?,
            recording_info: field(RECORDING)?,
            start_date: field(START_DATE)?,
            start_time: field(START_TIME)?,
        })
    }

    /// Build from free text; fields are padded or cut to their width.
    pub fn new(patient_id: &str, recording_info: &str, start_date: &str, start_time: &str) -> Self {
        Self {
            patient_id: pad(patient_id, PATIENT.1),
            recording_info: pad(recording_info, RECORDING.1),
            start_date: pad(start_date, START_DATE.1),
            start_time: pad(start_time, START_TIME.1),
        }
    }

    /// Serialise a complete main header.
    pub fn to_bytes(&self, n_records: usize, record_duration: f64, n_signals: usize) -> [u8; HEADER_LEN] {
        let mut out = [b' '; HEADER_LEN];
        let mut put = |off: usize, len: usize, s: &str| {
            let p = pad(s, len);
            out[off..off + len].copy_from_slice(&p.as_bytes()[..len]);
        };
        put(0, 8, "0");
        put(PATIENT.0, PATIENT.1, &self.patient_id);
        put(RECORDING.0, RECORDING.1, &self.recording_info);
        put(START_DATE.0, START_DATE.1, &self.start_date);
        put(START_TIME.0, START_TIME.1, &self.start_time);
        put(184, 8, &(HEADER_LEN * (n_signals + 1)).to_string());
        put(192, 44, "EDF+C");
        put(236, 8, &n_records.to_string());
        put(244, 8, &record_duration.to_string());
        put(252, 4, &n_signals.to_string());
        out
    }

    /// Decompose the identification fields.
    pub fn fields(&self) -> Result<HeaderFields> {
        let pt: Vec<&str> = self.patient_id.split_whitespace().collect();
        let rec: Vec<&str> = self.recording_info.split_whitespace().collect();
        let at = |v: &[&str], i: usize| v.get(i).copied().unwrap_or("X").to_string();

        let birthdate = match pt.get(2).copied() {
            None | Some("X") => None,
            Some(d) => Some(
                NaiveDate::parse_from_str(d, "%d-%b-%Y")
                    .with_context(|| format!("bad birthdate {d:?}"))?,
            ),
        };
        let patient = PatientFields {
            code: at(&pt, 0),
            sex: at(&pt, 1),
            birthdate,
            name: at(&pt, 3),
            additional: pt.get(4..).map(|r| r.join(" ")).unwrap_or_default(),
        };
        let recording = RecordingFields {
            admin_code: at(&rec, 2),
            technician: at(&rec, 3),
            equipment: at(&rec, 4),
            additional: rec.get(5..).map(|r| r.join(" ")).unwrap_or_default(),
        };
        Ok(HeaderFields { patient, recording, start: self.start()? })
    }

    /// Start timestamp. Two-digit years above 30 are 19xx, the rest 20xx.
    pub fn start(&self) -> Result<NaiveDateTime> {
        let triple = |s: &str, what: &str| -> Result<[u32; 3]> {
            let parts: Vec<&str> = s.trim().split('.').collect();
            if parts.len() != 3 {
                bail!("{what} {s:?} is not in dd.mm.yy form");
            }
            let mut out = [0u32; 3];
            for (o, p) in out.iter_mut().zip(&parts) {
                *o = p.parse().with_context(|| format!("{what} {s:?}: bad number {p:?}"))?;
            }
            Ok(out)
        };
        let [day, month, yy] = triple(&self.start_date, "start date")?;
        let [h, m, s] = triple(&self.start_time, "start time")?;
        let year = (if yy > 30 { 1900 + yy } else { 2000 + yy }) as i32;
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .with_context(|| format!("invalid start date {:?}", self.start_date))?;
        let time = NaiveTime::from_hms_opt(h, m, s)
            .with_context(|| format!("invalid start time {:?}", self.start_time))?;
        Ok(NaiveDateTime::new(date, time))
    }
}

/// Left-justify `s` in `len` ASCII columns.
fn pad(s: &str, len: usize) -> String {
    let mut out: String = s.chars().filter(char::is_ascii).take(len).collect();
    while out.len() < len {
        out.push(' ');
    }
    out
}
