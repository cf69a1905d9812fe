use super::{FieldMap, PlatformProfile};
use crate::constants::FREEADS;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::schema::CanonicalField::*;

/// Freeads ready dates are free text, often a day and month with no year.
pub struct FreeadsProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("ad_id", AdId),
    ("date_posted", PublishedAt),
    ("title", Title),
    ("breed", Breed),
    ("sex", Sex),
    ("color", Color),
    ("age", Age),
    ("puppy_age", Age),
    ("ready_date", ReadyToLeave),
    ("price", Price),
    ("location", Location),
    ("seller_name", SellerName),
    ("males_available", MalesAvailable),
    ("females_available", FemalesAvailable),
    ("litter_size", TotalAvailable),
    ("kc_registered", KcRegistered),
    ("microchipped", Microchipped),
    ("vaccinated", Vaccinated),
    ("wormed", Wormed),
    ("health_checked", HealthChecked),
    ("vet_checked", HealthChecked),
];

impl PlatformProfile for FreeadsProfile {
    fn id(&self) -> &'static str {
        FREEADS
    }

    fn name(&self) -> &'static str {
        "Freeads"
    }

    fn file_pattern(&self) -> &'static str {
        "freeads_enriched_COMPLETE*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::FreeText
    }
}
