//! Test fixtures: source documents and submissions.

use engine_core::{NormalizedRecord, PriceRange, SourceTag, TaskSubmission};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Source A document. The first row is the Acme sale used by the
/// acceptance scenarios; row 4 has an unusable price.
pub const SOURCE_A_JSON: &str = r#"[
    {"company": "Acme", "car_model": "X1", "sale_date": "2020-05-01", "price": 20000, "location": "Austin", "customer_type": "retail"},
    {"company": "Honda", "model": "Civic", "date_of_sale": "2023-02-11", "price": "21999.5", "location": "San Francisco, CA", "customer_type": "retail"},
    {"company": "Toyota", "model": "Camry", "date_of_sale": "2021-08-30", "price": 26500, "location": "Dallas", "customer_type": "fleet"},
    {"company": "Ford", "model": "F-150", "date_of_sale": "2024-07-19", "price": "call us"}
]"#;

/// Source B document. Every dated row falls in 2023; the Ford row has an
/// unparsable year.
pub const SOURCE_B_CSV: &str = "\
company,car_model,sale_date,price,location,customer_type
Toyota,Corolla,2023-01-15,18500,Chicago,retail
Honda,Accord,2023-06-30,27000.50,Oakland,fleet
Ford,Focus,unknown,19000,Chicago,retail
Tesla,Model Y,2023-02-14,52000,San Francisco,
";

/// Source files written to a temporary directory.
pub struct DataDir {
    dir: TempDir,
}

impl DataDir {
    /// Writes both default documents.
    pub fn new() -> Self {
        Self::with_documents(Some(SOURCE_A_JSON), Some(SOURCE_B_CSV))
    }

    /// Writes the given documents; `None` leaves that file missing.
    pub fn with_documents(source_a: Option<&str>, source_b: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let data = Self { dir };
        if let Some(doc) = source_a {
            std::fs::write(data.source_a_path(), doc).expect("Failed to write source A");
        }
        if let Some(doc) = source_b {
            std::fs::write(data.source_b_path(), doc).expect("Failed to write source B");
        }
        data
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_a_path(&self) -> PathBuf {
        self.dir.path().join("source_a.json")
    }

    pub fn source_b_path(&self) -> PathBuf {
        self.dir.path().join("source_b.csv")
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Submission over `[start_year, end_year]` with no other restriction.
pub fn submission(name: &str, start_year: i32, end_year: i32) -> TaskSubmission {
    TaskSubmission {
        name: name.to_string(),
        start_year,
        end_year,
        source_a_brands: Vec::new(),
        source_b_brands: Vec::new(),
        price_range: None,
        location: None,
    }
}

/// Submission restricted to the given Source A brands.
pub fn brand_submission(name: &str, start_year: i32, end_year: i32, brands: &[&str]) -> TaskSubmission {
    TaskSubmission {
        source_a_brands: brands.iter().map(|b| b.to_string()).collect(),
        ..submission(name, start_year, end_year)
    }
}

pub fn price_range(min: Option<f64>, max: Option<f64>) -> Option<PriceRange> {
    Some(PriceRange { min, max })
}

pub fn record(company: &str, sale_date: &str, price: f64, source: SourceTag) -> NormalizedRecord {
    NormalizedRecord {
        company: company.to_string(),
        model: "Test".to_string(),
        sale_date: sale_date.to_string(),
        price,
        location: "Austin".to_string(),
        customer_type: "retail".to_string(),
        source,
    }
}
