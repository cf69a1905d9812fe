//! The canonical listing schema every platform export is mapped into.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};

/// One named, nullable field of the canonical listing schema.
///
/// Declaration order is the default column order and the `Ord` used by
/// per-record field maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Url,
    AdId,
    Title,
    Breed,
    Sex,
    Color,
    Age,
    DateOfBirth,
    ReadyToLeave,
    CreatedAt,
    PublishedAt,
    RefreshedAt,
    Price,
    MalesAvailable,
    FemalesAvailable,
    TotalAvailable,
    Location,
    SellerId,
    SellerName,
    CompanyName,
    UserType,
    IsBreeder,
    LicenseNum,
    LicenseAuth,
    LicenseStatus,
    LicenseValid,
    MemberSince,
    LastActive,
    ViewsCount,
    Reviews,
    Rating,
    KcRegistered,
    Microchipped,
    Vaccinated,
    HealthChecked,
    Wormed,
    Sire,
    Dam,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 38] = [
        CanonicalField::Url,
        CanonicalField::AdId,
        CanonicalField::Title,
        CanonicalField::Breed,
        CanonicalField::Sex,
        CanonicalField::Color,
        CanonicalField::Age,
        CanonicalField::DateOfBirth,
        CanonicalField::ReadyToLeave,
        CanonicalField::CreatedAt,
        CanonicalField::PublishedAt,
        CanonicalField::RefreshedAt,
        CanonicalField::Price,
        CanonicalField::MalesAvailable,
        CanonicalField::FemalesAvailable,
        CanonicalField::TotalAvailable,
        CanonicalField::Location,
        CanonicalField::SellerId,
        CanonicalField::SellerName,
        CanonicalField::CompanyName,
        CanonicalField::UserType,
        CanonicalField::IsBreeder,
        CanonicalField::LicenseNum,
        CanonicalField::LicenseAuth,
        CanonicalField::LicenseStatus,
        CanonicalField::LicenseValid,
        CanonicalField::MemberSince,
        CanonicalField::LastActive,
        CanonicalField::ViewsCount,
        CanonicalField::Reviews,
        CanonicalField::Rating,
        CanonicalField::KcRegistered,
        CanonicalField::Microchipped,
        CanonicalField::Vaccinated,
        CanonicalField::HealthChecked,
        CanonicalField::Wormed,
        CanonicalField::Sire,
        CanonicalField::Dam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Url => "url",
            CanonicalField::AdId => "ad_id",
            CanonicalField::Title => "title",
            CanonicalField::Breed => "breed",
            CanonicalField::Sex => "sex",
            CanonicalField::Color => "color",
            CanonicalField::Age => "age",
            CanonicalField::DateOfBirth => "date_of_birth",
            CanonicalField::ReadyToLeave => "ready_to_leave",
            CanonicalField::CreatedAt => "created_at",
            CanonicalField::PublishedAt => "published_at",
            CanonicalField::RefreshedAt => "refreshed_at",
            CanonicalField::Price => "price",
            CanonicalField::MalesAvailable => "males_available",
            CanonicalField::FemalesAvailable => "females_available",
            CanonicalField::TotalAvailable => "total_available",
            CanonicalField::Location => "location",
            CanonicalField::SellerId => "seller_id",
            CanonicalField::SellerName => "seller_name",
            CanonicalField::CompanyName => "company_name",
            CanonicalField::UserType => "user_type",
            CanonicalField::IsBreeder => "is_breeder",
            CanonicalField::LicenseNum => "license_num",
            CanonicalField::LicenseAuth => "license_auth",
            CanonicalField::LicenseStatus => "license_status",
            CanonicalField::LicenseValid => "license_valid",
            CanonicalField::MemberSince => "member_since",
            CanonicalField::LastActive => "last_active",
            CanonicalField::ViewsCount => "views_count",
            CanonicalField::Reviews => "reviews",
            CanonicalField::Rating => "rating",
            CanonicalField::KcRegistered => "kc_registered",
            CanonicalField::Microchipped => "microchipped",
            CanonicalField::Vaccinated => "vaccinated",
            CanonicalField::HealthChecked => "health_checked",
            CanonicalField::Wormed => "wormed",
            CanonicalField::Sire => "sire",
            CanonicalField::Dam => "dam",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered canonical field list loaded from the schema definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSchema {
    fields: Vec<CanonicalField>,
}

impl CanonicalSchema {
    /// Load the schema definition (a CSV with a `field_name` column).
    ///
    /// A missing file, a missing column, an unknown or duplicated field name,
    /// or an empty definition are all structural failures.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(format!(
                "canonical schema definition {}",
                path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let name_col = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == "field_name")
            .ok_or_else(|| PipelineError::MalformedInput {
                path: path.display().to_string(),
                message: "missing 'field_name' column".to_string(),
            })?;

        let mut names = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(name) = record.get(name_col).filter(|n| !n.is_empty()) {
                names.push(name.to_string());
            }
        }

        let schema = Self::from_names(&names)?;
        info!(path = %path.display(), fields = schema.len(), "Loaded canonical schema");
        Ok(schema)
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let field = CanonicalField::from_name(name)
                .ok_or_else(|| PipelineError::Schema(format!("unknown canonical field '{name}'")))?;
            if !seen.insert(field) {
                return Err(PipelineError::Schema(format!("field '{name}' listed twice")));
            }
            fields.push(field);
        }
        if fields.is_empty() {
            return Err(PipelineError::Schema("schema definition lists no fields".into()));
        }
        Ok(Self { fields })
    }

    /// Every canonical field in declaration order
    pub fn builtin() -> Self {
        Self { fields: CanonicalField::ALL.to_vec() }
    }

    pub fn fields(&self) -> &[CanonicalField] {
        &self.fields
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn names_round_trip_for_every_field() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(CanonicalField::from_name("description"), None);
    }

    #[test]
    fn load_reads_field_names_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "field_name,description").unwrap();
        writeln!(file, "breed,Breed name").unwrap();
        writeln!(file, "price,Asking price").unwrap();
        writeln!(file, "url,Listing URL").unwrap();

        let schema = CanonicalSchema::load(file.path()).unwrap();
        assert_eq!(
            schema.fields(),
            &[CanonicalField::Breed, CanonicalField::Price, CanonicalField::Url]
        );
    }

    #[test]
    fn missing_definition_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let err = CanonicalSchema::load(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = CanonicalSchema::from_names(&["breed", "colour"]).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn duplicate_field_is_rejected() {
        assert!(CanonicalSchema::from_names(&["breed", "breed"]).is_err());
    }
}
