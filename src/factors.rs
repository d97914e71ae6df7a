//! Physical factors: one time-integrated scalar per (spacecraft, term).
//!
//! [`PhysicalFactors`] holds the factors of one spacecraft, [`FactorTable`] those of a
//! whole analysis. Both are immutable inputs of the fit: lookups of an unknown spacecraft
//! or term fail with [`FlybyError::NotFound`] instead of returning a default.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{
    constants::{SpacecraftId, SpacecraftMap},
    flyby_errors::FlybyError,
    integrands::Term,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalFactors {
    values: BTreeMap<Term, f64>,
}

impl PhysicalFactors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(term, value)` pairs, rejecting non-finite values.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, FlybyError>
    where
        I: IntoIterator<Item = (Term, f64)>,
    {
        let mut factors = PhysicalFactors::new();
        for (term, value) in pairs {
            factors.insert(term, value)?;
        }
        Ok(factors)
    }

    /// Insert or replace the factor of a term.
    pub fn insert(&mut self, term: Term, value: f64) -> Result<(), FlybyError> {
        if !value.is_finite() {
            return Err(FlybyError::InvalidInput(format!(
                "non-finite factor {value} for term '{term}'"
            )));
        }
        self.values.insert(term, value);
        Ok(())
    }

    pub fn get(&self, term: Term) -> Result<f64, FlybyError> {
        self.values
            .get(&term)
            .copied()
            .ok_or_else(|| FlybyError::NotFound {
                kind: "factor",
                key: term.to_string(),
            })
    }

    pub fn terms(&self) -> impl Iterator<Item = Term> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Term, f64)> + '_ {
        self.values.iter().map(|(t, v)| (*t, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Factors of every spacecraft of an analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorTable {
    rows: SpacecraftMap<PhysicalFactors>,
}

impl FactorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SpacecraftId, factors: PhysicalFactors) {
        self.rows.insert(id, factors);
    }

    pub fn get(&self, id: &SpacecraftId) -> Result<&PhysicalFactors, FlybyError> {
        self.rows.get(id).ok_or_else(|| FlybyError::NotFound {
            kind: "spacecraft factors",
            key: id.to_string(),
        })
    }

    /// Factor values of `id` in the order of `terms`.
    pub fn row(&self, id: &SpacecraftId, terms: &[Term]) -> Result<Vec<f64>, FlybyError> {
        let factors = self.get(id)?;
        terms
            .iter()
            .map(|&t| {
                factors.get(t).map_err(|_| FlybyError::NotFound {
                    kind: "factor",
                    key: format!("{id}/{t}"),
                })
            })
            .collect()
    }

    /// Spacecraft identifiers in lexicographic order.
    pub fn ids(&self) -> Vec<SpacecraftId> {
        self.rows.keys().cloned().sorted().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<(SpacecraftId, PhysicalFactors)> for FactorTable {
    fn from_iter<I: IntoIterator<Item = (SpacecraftId, PhysicalFactors)>>(iter: I) -> Self {
        FactorTable {
            rows: iter.into_iter().collect(),
        }
    }
}
