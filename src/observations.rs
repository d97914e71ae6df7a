//! Measured flyby anomalies.

use crate::{
    constants::{MeterPerSecond, SpacecraftId, SpacecraftMap, MM_S_TO_M_S},
    flyby_errors::FlybyError,
};

/// Observed asymptotic velocity anomaly of one flyby, in m/s.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub id: SpacecraftId,
    pub anomaly: MeterPerSecond,
    pub uncertainty: MeterPerSecond,
}

impl ObservationRecord {
    /// Build a record, rejecting non-finite values and non-positive uncertainties.
    pub fn new(
        id: impl Into<SpacecraftId>,
        anomaly: MeterPerSecond,
        uncertainty: MeterPerSecond,
    ) -> Result<Self, FlybyError> {
        let id = id.into();
        if !anomaly.is_finite() {
            return Err(FlybyError::InvalidInput(format!(
                "non-finite anomaly for {id}"
            )));
        }
        if !(uncertainty.is_finite() && uncertainty > 0.0) {
            return Err(FlybyError::InvalidInput(format!(
                "uncertainty of {id} must be positive, got {uncertainty}"
            )));
        }
        Ok(ObservationRecord {
            id,
            anomaly,
            uncertainty,
        })
    }

    /// Same as [`ObservationRecord::new`] with values given in mm/s.
    pub fn from_mm_s(
        id: impl Into<SpacecraftId>,
        anomaly_mm_s: f64,
        uncertainty_mm_s: f64,
    ) -> Result<Self, FlybyError> {
        Self::new(
            id,
            anomaly_mm_s * MM_S_TO_M_S,
            uncertainty_mm_s * MM_S_TO_M_S,
        )
    }
}

/// Observations keyed by spacecraft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    records: SpacecraftMap<ObservationRecord>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing and returning any previous one for the same spacecraft.
    pub fn insert(&mut self, record: ObservationRecord) -> Option<ObservationRecord> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn get(&self, id: &SpacecraftId) -> Result<&ObservationRecord, FlybyError> {
        self.records.get(id).ok_or_else(|| FlybyError::NotFound {
            kind: "observation",
            key: id.to_string(),
        })
    }

    pub fn contains(&self, id: &SpacecraftId) -> bool {
        self.records.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ObservationRecord> for ObservationSet {
    fn from_iter<I: IntoIterator<Item = ObservationRecord>>(iter: I) -> Self {
        let mut set = ObservationSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}
