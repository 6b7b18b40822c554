//! Filter criteria and the record evaluator.
//!
//! All rules are ANDed:
//! 1. sale year within `[start_year, end_year]` (fails closed on a bad date)
//! 2. source-scoped brand allow-list, exact match
//! 3. case-insensitive location substring
//! 4. price range, each bound optional

use serde::{Deserialize, Serialize};

use crate::record::{NormalizedRecord, SourceTag};

/// Optional price bounds, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min.map_or(true, |min| price >= min) && self.max.map_or(true, |max| price <= max)
    }
}

/// Constraints a record must satisfy to be accepted into a task's result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub source_a_brands: Vec<String>,
    #[serde(default)]
    pub source_b_brands: Vec<String>,
    #[serde(default)]
    pub price_range: Option<PriceRange>,
    #[serde(default)]
    pub location: Option<String>,
}

impl FilterCriteria {
    /// Criteria restricted only by year range.
    pub fn years(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            source_a_brands: Vec::new(),
            source_b_brands: Vec::new(),
            price_range: None,
            location: None,
        }
    }

    /// Brand allow-list that applies to records from `source`.
    pub fn brands_for(&self, source: SourceTag) -> &[String] {
        match source {
            SourceTag::A => &self.source_a_brands,
            SourceTag::B => &self.source_b_brands,
        }
    }
}

/// Outcome of evaluating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
    /// The record cannot be evaluated; it is excluded and must be counted.
    Malformed(String),
}

/// Evaluates `record` against `criteria`.
pub fn evaluate(record: &NormalizedRecord, criteria: &FilterCriteria) -> Verdict {
    let Some(year) = record.sale_year() else {
        return Verdict::Malformed(format!(
            "sale_date {:?} does not start with a year",
            record.sale_date
        ));
    };

    if year < criteria.start_year || year > criteria.end_year {
        return Verdict::Rejected;
    }

    let brands = criteria.brands_for(record.source);
    if !brands.is_empty() && !brands.iter().any(|b| b == &record.company) {
        return Verdict::Rejected;
    }

    if let Some(ref location) = criteria.location {
        if !record
            .location
            .to_lowercase()
            .contains(&location.to_lowercase())
        {
            return Verdict::Rejected;
        }
    }

    if let Some(ref range) = criteria.price_range {
        if !range.contains(record.price) {
            return Verdict::Rejected;
        }
    }

    Verdict::Accepted
}

/// Whether `record` is accepted by `criteria`.
pub fn matches(record: &NormalizedRecord, criteria: &FilterCriteria) -> bool {
    evaluate(record, criteria) == Verdict::Accepted
}
