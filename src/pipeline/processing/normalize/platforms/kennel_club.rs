use super::{FieldMap, PlatformProfile};
use crate::constants::KENNEL_CLUB;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::schema::CanonicalField::*;

/// Kennel Club litter register. Listings are litters, titled by puppy name,
/// and carry breeder licence details.
pub struct KennelClubProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("breed", Breed),
    ("puppy_name", Title),
    ("date_of_birth", DateOfBirth),
    ("born", DateOfBirth),
    ("ready_to_leave", ReadyToLeave),
    ("sex", Sex),
    ("colour", Color),
    ("price", Price),
    ("location", Location),
    ("county", Location),
    ("breeder_name", SellerName),
    ("phone", SellerId),
    ("license_number", LicenseNum),
    ("council", LicenseAuth),
    ("sire", Sire),
    ("dam", Dam),
];

impl PlatformProfile for KennelClubProfile {
    fn id(&self) -> &'static str {
        KENNEL_CLUB
    }

    fn name(&self) -> &'static str {
        "Kennel Club"
    }

    fn file_pattern(&self) -> &'static str {
        "kc_data_PERFECT*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::DirectDate
    }
}
