//! Templates for the flat per-exam tables produced upstream.

use serde::{Deserialize, Serialize};

pub const DATASET_NAME: &str = "dataset_name";
pub const RECORD_ID: &str = "record_id";

/// Columns the assembler writes back onto the records table.
pub const PERSON_ID: &str = "person_id";
pub const VISIT_ID: &str = "visit_id";
pub const PROCEDURE_ID: &str = "procedure_id";

/// Value type of a flat column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatType {
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatColumn {
    pub name: &'static str,
    pub ty: FlatType,
}

const fn col(name: &'static str, ty: FlatType) -> FlatColumn {
    FlatColumn { name, ty }
}

const RECORDS: &[FlatColumn] = &[
    col("record_id", FlatType::Integer),
    col("record_name", FlatType::Text),
    col("patient_id", FlatType::Text),
    col("age", FlatType::Float),
    col("sex", FlatType::Text),
    col("recording_start", FlatType::Text),
    col("recording_end", FlatType::Text),
    col("sampling_frequency", FlatType::Float),
    col("lead_names", FlatType::Text),
    col("diagnosis", FlatType::Text),
];

const SAMPLES: &[FlatColumn] = &[
    col("sample_id", FlatType::Integer),
    col("record_id", FlatType::Integer),
    col("lead", FlatType::Text),
    col("value", FlatType::Float),
];

const RR_INTERVALS: &[FlatColumn] = &[
    col("rr_id", FlatType::Integer),
    col("record_id", FlatType::Integer),
    col("rr_ms", FlatType::Float),
];

const ANNOTATIONS: &[FlatColumn] = &[
    col("annotation_id", FlatType::Integer),
    col("record_id", FlatType::Integer),
    col("sample", FlatType::Integer),
    col("symbol", FlatType::Text),
];

const HRV_METRICS: &[FlatColumn] = &[
    col("hrv_id", FlatType::Integer),
    col("record_id", FlatType::Integer),
    col("mean_nni", FlatType::Float),
    col("sdnn", FlatType::Float),
    col("rmssd", FlatType::Float),
    col("pnn50", FlatType::Float),
    col("mean_hr", FlatType::Float),
    col("lf_hf_ratio", FlatType::Float),
];

const AUTO_DIAGNOSES: &[FlatColumn] = &[
    col("auto_diagnosis_id", FlatType::Integer),
    col("record_id", FlatType::Integer),
    col("diagnosis", FlatType::Text),
];

/// The flat input tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatTableKind {
    Records,
    Samples,
    RrIntervals,
    Annotations,
    HrvMetrics,
    AutoDiagnoses,
}

impl FlatTableKind {
    /// Import order: the records table first, since it is every other
    /// table's parent.
    pub const ALL: [Self; 6] = [
        Self::Records,
        Self::Samples,
        Self::RrIntervals,
        Self::Annotations,
        Self::HrvMetrics,
        Self::AutoDiagnoses,
    ];

    /// File-stem prefix identifying this table's files.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Records => "records",
            Self::Samples => "samples",
            Self::RrIntervals => "rr_intervals",
            Self::Annotations => "annotations",
            Self::HrvMetrics => "hrv",
            Self::AutoDiagnoses => "auto_diagnoses",
        }
    }

    pub const fn primary_key(self) -> &'static str {
        match self {
            Self::Records => "record_id",
            Self::Samples => "sample_id",
            Self::RrIntervals => "rr_id",
            Self::Annotations => "annotation_id",
            Self::HrvMetrics => "hrv_id",
            Self::AutoDiagnoses => "auto_diagnosis_id",
        }
    }

    /// Column referencing the records table, if any.
    pub const fn foreign_key(self) -> Option<&'static str> {
        match self {
            Self::Records => None,
            _ => Some(RECORD_ID),
        }
    }

    pub const fn columns(self) -> &'static [FlatColumn] {
        match self {
            Self::Records => RECORDS,
            Self::Samples => SAMPLES,
            Self::RrIntervals => RR_INTERVALS,
            Self::Annotations => ANNOTATIONS,
            Self::HrvMetrics => HRV_METRICS,
            Self::AutoDiagnoses => AUTO_DIAGNOSES,
        }
    }

    /// Whether an import of this table requires at least one file.
    pub const fn required(self) -> bool {
        matches!(self, Self::Records)
    }
}

impl std::fmt::Display for FlatTableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}
