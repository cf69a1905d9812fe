use super::{FieldMap, PlatformProfile};
use crate::constants::PETS4HOMES;
use crate::pipeline::processing::availability::AvailabilityRule;
use crate::schema::CanonicalField::*;

/// Pets4Homes exports already use canonical column names.
pub struct Pets4homesProfile;

const FIELD_MAP: FieldMap = &[
    ("url", Url),
    ("created_at", CreatedAt),
    ("published_at", PublishedAt),
    ("refreshed_at", RefreshedAt),
    ("title", Title),
    ("breed", Breed),
    ("date_of_birth", DateOfBirth),
    ("ready_to_leave", ReadyToLeave),
    ("males_available", MalesAvailable),
    ("females_available", FemalesAvailable),
    ("total_available", TotalAvailable),
    ("price", Price),
    ("location", Location),
    ("seller_id", SellerId),
    ("seller_name", SellerName),
    ("company_name", CompanyName),
    ("user_type", UserType),
    ("is_breeder", IsBreeder),
    ("license_num", LicenseNum),
    ("license_auth", LicenseAuth),
    ("license_status", LicenseStatus),
    ("license_valid", LicenseValid),
    ("member_since", MemberSince),
    ("last_active", LastActive),
    ("reviews", Reviews),
    ("rating", Rating),
    ("views_count", ViewsCount),
];

impl PlatformProfile for Pets4homesProfile {
    fn id(&self) -> &'static str {
        PETS4HOMES
    }

    fn name(&self) -> &'static str {
        "Pets4Homes"
    }

    fn file_pattern(&self) -> &'static str {
        "pets4homes_v7_complete*.csv"
    }

    fn field_map(&self) -> FieldMap {
        FIELD_MAP
    }

    fn availability_rule(&self) -> AvailabilityRule {
        AvailabilityRule::ExactDate
    }
}
