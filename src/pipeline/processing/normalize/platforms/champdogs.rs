use super::{ad_id_first, FieldMap, PlatformProfile};
use crate::constants::CHAMPDOGS;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::schema::CanonicalField::*;

/// Champdogs lists litters by breeder kennel rather than individual ads.
pub struct ChampdogsProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("listing_id", AdId),
    ("date_available", ReadyToLeave),
    ("date_born", DateOfBirth),
    ("breed", Breed),
    ("price", Price),
    ("location", Location),
    ("county", Location),
    ("breeder_name", SellerName),
    ("breeder_url", SellerId),
    ("kennel_name", CompanyName),
    ("males_available", MalesAvailable),
    ("females_available", FemalesAvailable),
    ("puppies_available", TotalAvailable),
    ("sire_name", Sire),
    ("dam_name", Dam),
    ("health_tests", HealthChecked),
    ("microchipped", Microchipped),
    ("vaccinated", Vaccinated),
    ("wormed", Wormed),
];

impl PlatformProfile for ChampdogsProfile {
    fn id(&self) -> &'static str {
        CHAMPDOGS
    }

    fn name(&self) -> &'static str {
        "Champdogs"
    }

    fn file_pattern(&self) -> &'static str {
        "champdogs_complete*.csv"
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
