use super::{FieldMap, PlatformProfile};
use crate::constants::FOREVERPUPPY;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::schema::CanonicalField::*;

pub struct ForeverpuppyProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("ad_id", AdId),
    ("created", PublishedAt),
    ("title", Title),
    ("breed", Breed),
    ("age", Age),
    ("ready_to_leave", ReadyToLeave),
    ("price", Price),
    ("location", Location),
    ("seller_name", SellerName),
    ("seller_type", UserType),
    ("boys", MalesAvailable),
    ("girls", FemalesAvailable),
    ("litter_size", TotalAvailable),
    ("available", TotalAvailable),
    ("kc_registered", KcRegistered),
    ("microchipped", Microchipped),
    ("vaccinated", Vaccinated),
];

impl PlatformProfile for ForeverpuppyProfile {
    fn id(&self) -> &'static str {
        FOREVERPUPPY
    }

    fn name(&self) -> &'static str {
        "ForeverPuppy"
    }

    fn file_pattern(&self) -> &'static str {
        "foreverpuppy_FINAL*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::DirectDate
    }
}
