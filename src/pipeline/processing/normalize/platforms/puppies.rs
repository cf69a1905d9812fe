use super::{ad_id_first, FieldMap, PlatformProfile};
use crate::constants::PUPPIES;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::schema::CanonicalField::*;

pub struct PuppiesProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("ad_reference", AdId),
    ("posted_date", PublishedAt),
    ("title", Title),
    ("breed", Breed),
    ("ready_to_leave", ReadyToLeave),
    ("date_of_birth", DateOfBirth),
    ("price", Price),
    ("location", Location),
    ("seller_name", SellerName),
    ("seller_type", UserType),
    ("member_since", MemberSince),
    ("males_available", MalesAvailable),
    ("females_available", FemalesAvailable),
    ("puppies_available", TotalAvailable),
    ("health_tested", HealthChecked),
    ("vet_checked", HealthChecked),
    ("wormed", Wormed),
    ("sire_info", Sire),
    ("dam_info", Dam),
];

impl PlatformProfile for PuppiesProfile {
    fn id(&self) -> &'static str {
        PUPPIES
    }

    fn name(&self) -> &'static str {
        "Puppies.co.uk"
    }

    fn file_pattern(&self) -> &'static str {
        "puppies_final*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::DirectDate
    }

    fn listing_id(&self, fact: &CanonicalFact) -> Option<String> {
        ad_id_first(fact)
    }
}
