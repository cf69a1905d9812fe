use super::{FieldMap, PlatformProfile};
use crate::constants::GUMTREE;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::schema::CanonicalField::*;

pub struct GumtreeProfile;

// `description` only fills the title when the title itself is blank
const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("ad_id", AdId),
    ("posted", PublishedAt),
    ("title", Title),
    ("description", Title),
    ("breed", Breed),
    ("sex", Sex),
    ("age_detail", Age),
    ("ready_to_leave", ReadyToLeave),
    ("price", Price),
    ("location", Location),
    ("seller_name", SellerName),
    ("microchipped", Microchipped),
    ("vaccinated", Vaccinated),
    ("kc_registered", KcRegistered),
    ("health_checked", HealthChecked),
    ("neutered", Wormed),
];

impl PlatformProfile for GumtreeProfile {
    fn id(&self) -> &'static str {
        GUMTREE
    }

    fn name(&self) -> &'static str {
        "Gumtree"
    }

    fn file_pattern(&self) -> &'static str {
        "gumtree_final*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::RelativePhrase
    }
}
