//! The flat tables one run assembles from.

use std::path::Path;

use omop_model::FlatTableKind;
use polars::prelude::DataFrame;

use crate::error::Result;
use crate::id_map::IdMap;
use crate::importer::{TableImporter, TableTemplate};

/// The flat tables of an input root that feed assembly, keys reassigned.
///
/// Sample and RR-interval tables are not read here; import them through
/// [`TableImporter`] directly when needed.
#[derive(Debug, Clone)]
pub struct FlatInputs {
    pub records: DataFrame,
    pub annotations: DataFrame,
    pub hrv_metrics: DataFrame,
    pub auto_diagnoses: DataFrame,
    /// Original record keys per dataset.
    pub record_ids: IdMap,
}

impl FlatInputs {
    /// Imports the records table first, then its dependents through the
    /// records id map. Only the records table must be present.
    pub fn import(root: &Path) -> Result<Self> {
        let importer = TableImporter::new(root);
        let (records, record_ids) = importer.import(
            &TableTemplate::from(FlatTableKind::Records),
            FlatTableKind::Records.required(),
            None,
        )?;
        let dependent = |kind: FlatTableKind| -> Result<DataFrame> {
            let (df, _) =
                importer.import(&TableTemplate::from(kind), kind.required(), Some(&record_ids))?;
            Ok(df)
        };
        Ok(Self {
            annotations: dependent(FlatTableKind::Annotations)?,
            hrv_metrics: dependent(FlatTableKind::HrvMetrics)?,
            auto_diagnoses: dependent(FlatTableKind::AutoDiagnoses)?,
            records,
            record_ids,
        })
    }
}
