use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{GenuaError, Result, StoreError, ValidationError};
use crate::mapping::parse_optional_swelling;
use crate::models::{
    parse_pain_level, parse_timestamp, Observation, PatientId, PatientProfile,
    StandardizedAssessment,
};

use super::{ImportSummary, RecordStore, Sheet};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const CHECKIN_COLUMNS: [&str; 9] = [
    "timestamp",
    "patient",
    "pain_level",
    "sleep_quality",
    "posture",
    "squat_test",
    "step_up_test",
    "step_down_test",
    "swelling_grade",
];
const ASSESSMENT_COLUMNS: [&str; 3] = ["date", "patient", "score"];
const REGISTRY_COLUMNS: [&str; 2] = ["patient", "history"];

/// Header variations accepted per canonical column, including the
/// Portuguese headers of the original spreadsheet export
fn column_aliases() -> HashMap<String, &'static str> {
    let mut mapping = HashMap::new();
    let mut add = |standard: &'static str, variations: &[&str]| {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard);
        }
    };

    add("timestamp", &["timestamp", "data", "datetime", "date_time", "data_hora"]);
    add("date", &["date", "data_avaliacao"]);
    add("patient", &["patient", "paciente", "name", "nome", "patient_name"]);
    add("pain_level", &["pain_level", "pain", "dor", "nivel_dor"]);
    add("sleep_quality", &["sleep_quality", "sleep", "sono"]);
    add("posture", &["posture", "postura"]);
    add("squat_test", &["squat_test", "squat", "agachamento"]);
    add("step_up_test", &["step_up_test", "step_up", "stepup", "subida"]);
    add("step_down_test", &["step_down_test", "step_down", "stepdown", "descida"]);
    add(
        "swelling_grade",
        &["swelling_grade", "swelling", "inchaco", "inchaço", "edema", "stroke_test"],
    );
    add("score", &["score", "ikdc", "ikdc_score", "pontuacao", "pontuação"]);
    add("history", &["history", "historico", "histórico", "clinical_history", "notes"]);

    mapping
}

fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Header position of each canonical column in one sheet file
struct ColumnIndex {
    sheet: &'static str,
    positions: HashMap<&'static str, usize>,
    width: usize,
}

impl ColumnIndex {
    fn from_headers(sheet: &'static str, headers: &StringRecord, date_sheet: bool) -> Self {
        let aliases = column_aliases();
        let mut positions = HashMap::new();

        for (i, header) in headers.iter().enumerate() {
            let normalized = normalize_column_name(header);
            let standard = match aliases.get(&normalized) {
                Some(standard) => *standard,
                None => continue,
            };
            // Assessment sheets key on a date; "data"/"date" mean the same there
            let standard = match standard {
                "timestamp" if date_sheet => "date",
                other => other,
            };
            positions.entry(standard).or_insert(i);
        }

        ColumnIndex {
            sheet,
            positions,
            width: headers.len(),
        }
    }

    fn require(&self, column: &'static str) -> Result<usize> {
        self.positions.get(column).copied().ok_or_else(|| {
            StoreError::MissingColumn {
                sheet: self.sheet,
                column,
            }
            .into()
        })
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &'static str) -> Result<&'r str> {
        let position = self.require(column)?;
        Ok(record.get(position).unwrap_or("").trim())
    }

    fn optional<'r>(&self, record: &'r StringRecord, column: &'static str) -> Option<&'r str> {
        self.positions
            .get(column)
            .and_then(|position| record.get(*position))
            .map(str::trim)
    }

    /// Lay canonical values out in this file's column order
    fn layout(&self, values: &[(&'static str, String)]) -> Result<Vec<String>> {
        let mut row = vec![String::new(); self.width];
        for (column, value) in values {
            let column = *column;
            match self.positions.get(column) {
                Some(position) => row[*position] = value.clone(),
                None if value.is_empty() => {}
                None => {
                    return Err(StoreError::MissingColumn {
                        sheet: self.sheet,
                        column,
                    }
                    .into())
                }
            }
        }
        Ok(row)
    }
}

fn observation_from_record(index: &ColumnIndex, record: &StringRecord) -> Result<Observation> {
    let patient = PatientId::new(index.get(record, "patient")?)?;
    let timestamp = parse_timestamp(index.get(record, "timestamp")?)?;
    let pain_level = parse_pain_level(index.get(record, "pain_level")?)?;

    Ok(Observation {
        patient,
        timestamp,
        pain_level,
        sleep_quality: index.get(record, "sleep_quality")?.parse()?,
        posture: index.get(record, "posture")?.parse()?,
        squat_test: index.get(record, "squat_test")?.parse()?,
        step_up_test: index.get(record, "step_up_test")?.parse()?,
        step_down_test: index.get(record, "step_down_test")?.parse()?,
        swelling_grade: parse_optional_swelling(index.optional(record, "swelling_grade"))?,
    })
}

fn observation_values(observation: &Observation) -> Vec<(&'static str, String)> {
    vec![
        ("timestamp", observation.timestamp.format(TIMESTAMP_FORMAT).to_string()),
        ("patient", observation.patient.display_name().to_string()),
        ("pain_level", observation.pain_level.to_string()),
        ("sleep_quality", observation.sleep_quality.to_string()),
        ("posture", observation.posture.to_string()),
        ("squat_test", observation.squat_test.to_string()),
        ("step_up_test", observation.step_up_test.to_string()),
        ("step_down_test", observation.step_down_test.to_string()),
        (
            "swelling_grade",
            observation
                .swelling_grade
                .map(|g| g.to_string())
                .unwrap_or_default(),
        ),
    ]
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    parse_timestamp(value)
        .map(|ts| ts.date())
        .map_err(GenuaError::from)
}

fn assessment_from_record(index: &ColumnIndex, record: &StringRecord) -> Result<StandardizedAssessment> {
    let patient = PatientId::new(index.get(record, "patient")?)?;
    let date = parse_date(index.get(record, "date")?)?;
    let raw_score = index.get(record, "score")?;
    let score: f64 = raw_score
        .replace(',', ".")
        .parse()
        .map_err(|_| ValidationError::OutOfRange {
            field: "score",
            value: raw_score.to_string(),
            expected: "number 0-100",
        })?;
    Ok(StandardizedAssessment::new(patient, date, score)?)
}

/// Only the patient column; listing patients never parses clinical fields
fn patient_from_record(index: &ColumnIndex, record: &StringRecord) -> Result<PatientId> {
    Ok(PatientId::new(index.get(record, "patient")?)?)
}

fn profile_from_record(index: &ColumnIndex, record: &StringRecord) -> Result<PatientProfile> {
    Ok(PatientProfile {
        patient: PatientId::new(index.get(record, "patient")?)?,
        history: index.optional(record, "history").unwrap_or("").to_string(),
    })
}

/// CSV-file store: one file per sheet inside a data directory
#[derive(Debug, Clone)]
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    /// Open (and create if needed) a store rooted at `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::Io {
            path: data_dir.clone(),
            source,
        })?;
        debug!(data_dir = %data_dir.display(), "Opened CSV record store");
        Ok(CsvStore { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn sheet_path(&self, sheet: Sheet) -> PathBuf {
        self.data_dir.join(format!("{}.csv", sheet.name()))
    }

    fn canonical_columns(sheet: Sheet) -> &'static [&'static str] {
        match sheet {
            Sheet::CheckIns => &CHECKIN_COLUMNS,
            Sheet::Assessments => &ASSESSMENT_COLUMNS,
            Sheet::Registry => &REGISTRY_COLUMNS,
        }
    }

    /// Read a sheet file, turning each row into a record with `parse`.
    ///
    /// With `only` set, rows for other patients are skipped before any of
    /// their other fields are parsed.
    fn read_file<T, F>(path: &Path, sheet: Sheet, only: Option<&PatientId>, parse: F) -> Result<Vec<T>>
    where
        F: Fn(&ColumnIndex, &StringRecord) -> Result<T>,
    {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let csv_error = |source| StoreError::Csv {
            sheet: sheet.name(),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(csv_error)?;
        let headers = reader.headers().map_err(csv_error)?.clone();
        let index = ColumnIndex::from_headers(sheet.name(), &headers, sheet == Sheet::Assessments);

        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            if let Some(patient) = only {
                if !patient.matches(index.get(&record, "patient")?) {
                    continue;
                }
            }
            match parse(&index, &record) {
                Ok(value) => rows.push(value),
                Err(err) => {
                    // Header is line 1
                    warn!(sheet = sheet.name(), line = row + 2, error = %err, "Unreadable row");
                    return Err(err);
                }
            }
        }
        Ok(rows)
    }

    fn read_sheet<T, F>(&self, sheet: Sheet, only: Option<&PatientId>, parse: F) -> Result<Vec<T>>
    where
        F: Fn(&ColumnIndex, &StringRecord) -> Result<T>,
    {
        Self::read_file(&self.sheet_path(sheet), sheet, only, parse)
    }

    fn all_observations(&self) -> Result<Vec<Observation>> {
        self.read_sheet(Sheet::CheckIns, None, observation_from_record)
    }

    /// Terminate a last row left without a line break, so the next append starts its own line
    fn terminate_last_line(file: &mut File) -> io::Result<()> {
        if file.metadata()?.len() == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Append one row as a delta, writing the header first for a new file
    fn append_row(&self, sheet: Sheet, values: &[(&'static str, String)]) -> Result<()> {
        let path = self.sheet_path(sheet);
        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let csv_error = |source| StoreError::Csv {
            sheet: sheet.name(),
            source,
        };

        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let headers = if is_new {
            StringRecord::from(Self::canonical_columns(sheet).to_vec())
        } else {
            ReaderBuilder::new()
                .from_path(&path)
                .and_then(|mut reader| reader.headers().cloned())
                .map_err(csv_error)?
        };
        let index = ColumnIndex::from_headers(sheet.name(), &headers, sheet == Sheet::Assessments);
        let row = index.layout(values)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;
        if !is_new {
            Self::terminate_last_line(&mut file).map_err(io_error)?;
        }
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(&headers).map_err(csv_error)?;
        }
        writer.write_record(&row).map_err(csv_error)?;
        writer.flush().map_err(io_error)?;
        Ok(())
    }

    /// Import a check-in export (e.g. the original spreadsheet's CSV) into the check-in sheet
    pub fn import_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ImportSummary> {
        let path = path.as_ref();
        let incoming = Self::read_file(path, Sheet::CheckIns, None, |index, record| {
            observation_from_record(index, record)
        })?;

        let mut existing: Vec<String> = self
            .all_observations()?
            .iter()
            .map(Observation::record_key)
            .collect();
        let mut summary = ImportSummary {
            rows_read: incoming.len(),
            ..ImportSummary::default()
        };

        for observation in &incoming {
            let key = observation.record_key();
            if existing.contains(&key) {
                summary.skipped_duplicates += 1;
                continue;
            }
            self.append_row(Sheet::CheckIns, &observation_values(observation))?;
            existing.push(key);
            summary.imported += 1;
        }

        info!(
            file = %path.display(),
            rows = summary.rows_read,
            imported = summary.imported,
            skipped = summary.skipped_duplicates,
            "Imported check-ins"
        );
        Ok(summary)
    }
}

impl RecordStore for CsvStore {
    fn observations(&self, patient: &PatientId) -> Result<Vec<Observation>> {
        self.read_sheet(Sheet::CheckIns, Some(patient), observation_from_record)
    }

    fn append_observation(&mut self, observation: &Observation) -> Result<()> {
        let key = observation.record_key();
        let sheet = Sheet::CheckIns.name();

        if self
            .observations(&observation.patient)?
            .iter()
            .any(|o| o.record_key() == key)
        {
            return Err(StoreError::Duplicate { sheet, key }.into());
        }

        self.append_row(Sheet::CheckIns, &observation_values(observation))?;

        // Read-after-write: a racing writer must not make this row vanish silently
        let verified = self
            .observations(&observation.patient)?
            .iter()
            .any(|o| o.record_key() == key);
        if !verified {
            return Err(StoreError::WriteNotVerified { sheet, key }.into());
        }

        debug!(patient = %observation.patient.initials(), %key, "Appended check-in");
        Ok(())
    }

    fn assessments(&self, patient: &PatientId) -> Result<Vec<StandardizedAssessment>> {
        self.read_sheet(Sheet::Assessments, Some(patient), assessment_from_record)
    }

    fn append_assessment(&mut self, assessment: &StandardizedAssessment) -> Result<()> {
        self.append_row(
            Sheet::Assessments,
            &[
                ("date", assessment.date.format(DATE_FORMAT).to_string()),
                ("patient", assessment.patient.display_name().to_string()),
                ("score", assessment.score.to_string()),
            ],
        )?;
        debug!(patient = %assessment.patient.initials(), "Appended standardized assessment");
        Ok(())
    }

    fn profile(&self, patient: &PatientId) -> Result<Option<PatientProfile>> {
        Ok(self
            .read_sheet(Sheet::Registry, Some(patient), profile_from_record)?
            .into_iter()
            .last())
    }

    fn register_profile(&mut self, profile: &PatientProfile) -> Result<()> {
        self.append_row(
            Sheet::Registry,
            &[
                ("patient", profile.patient.display_name().to_string()),
                ("history", profile.history.clone()),
            ],
        )
    }

    fn patients(&self) -> Result<Vec<PatientId>> {
        let mut patients: Vec<PatientId> = Vec::new();
        let names = self
            .read_sheet(Sheet::CheckIns, None, patient_from_record)?
            .into_iter()
            .chain(self.read_sheet(Sheet::Registry, None, patient_from_record)?);
        for patient in names {
            if !patients.contains(&patient) {
                patients.push(patient);
            }
        }
        Ok(patients)
    }
}
