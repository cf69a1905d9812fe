use super::{ad_id_first, FieldMap, PlatformProfile};
use crate::constants::PETIFY;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::schema::CanonicalField::*;

pub struct PetifyProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("id", AdId),
    ("title", Title),
    ("breed", Breed),
    ("ready_to_leave", ReadyToLeave),
    ("price", Price),
    ("location", Location),
    ("seller_type", UserType),
    ("member_since", MemberSince),
    ("males_available", MalesAvailable),
    ("females_available", FemalesAvailable),
    ("views", ViewsCount),
    ("kc_registered", KcRegistered),
    ("microchipped", Microchipped),
    ("vaccinated", Vaccinated),
];

impl PlatformProfile for PetifyProfile {
    fn id(&self) -> &'static str {
        PETIFY
    }

    fn name(&self) -> &'static str {
        "Petify"
    }

    fn file_pattern(&self) -> &'static str {
        "petify_data_clean*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::DirectDate
    }

    // Petify URLs are slugs; the export's `id` column is the stable key
    fn listing_id(&self, fact: &CanonicalFact) -> Option<String> {
        ad_id_first(fact)
    }
}
