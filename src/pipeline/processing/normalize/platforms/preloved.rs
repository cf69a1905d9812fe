use super::{FieldMap, PlatformProfile};
use crate::constants::PRELOVED;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::schema::CanonicalField::*;

pub struct PrelovedProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("created", PublishedAt),
    ("title", Title),
    ("breed", Breed),
    ("sex", Sex),
    ("age", Age),
    ("ready_to_leave", ReadyToLeave),
    ("price", Price),
    ("location", Location),
    ("seller_name", SellerName),
    ("seller_type", UserType),
    ("member_since", MemberSince),
    ("views", ViewsCount),
    ("kc_registered", KcRegistered),
    ("microchipped", Microchipped),
    ("neutered", Wormed),
    ("vaccinations", Vaccinated),
    ("health_checks", HealthChecked),
];

impl PlatformProfile for PrelovedProfile {
    fn id(&self) -> &'static str {
        PRELOVED
    }

    fn name(&self) -> &'static str {
        "Preloved"
    }

    fn file_pattern(&self) -> &'static str {
        "preloved_enriched*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::DirectDate
    }
}
