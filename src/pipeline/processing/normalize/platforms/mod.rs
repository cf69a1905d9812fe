// Base trait and per-platform profiles for schema mapping

pub mod pets4homes;
pub mod gumtree;
pub mod freeads;
pub mod preloved;
pub mod kennel_club;
pub mod foreverpuppy;
pub mod petify;
pub mod puppies;
pub mod champdogs;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pipeline::processing::availability::AvailabilityRule;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::schema::CanonicalField;

pub use champdogs::ChampdogsProfile;
pub use foreverpuppy::ForeverpuppyProfile;
pub use freeads::FreeadsProfile;
pub use gumtree::GumtreeProfile;
pub use kennel_club::KennelClubProfile;
pub use petify::PetifyProfile;
pub use pets4homes::Pets4homesProfile;
pub use preloved::PrelovedProfile;
pub use puppies::PuppiesProfile;

/// Raw column → canonical field. Several entries may target one field;
/// table order is fallback priority.
pub type FieldMap = &'static [(&'static str, CanonicalField)];

static URL_LISTING_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5,}").expect("static regex"));

/// Everything platform-specific about turning an export into canonical facts.
pub trait PlatformProfile: Send + Sync {
    /// Platform id as written to the `platform` column
    fn id(&self) -> &'static str;

    /// Human-readable platform name
    fn name(&self) -> &'static str;

    /// Wildcard pattern matching this platform's export file names
    fn file_pattern(&self) -> &'static str;

    fn field_map(&self) -> FieldMap;

    /// How this platform's `ready_to_leave` text is interpreted
    fn availability_rule(&self) -> AvailabilityRule;

    /// Listing id used to spot re-scrapes of the same ad.
    ///
    /// Defaults to the last long numeric run in the URL, then the mapped ad id.
    fn listing_id(&self, fact: &CanonicalFact) -> Option<String> {
        fact.get(CanonicalField::Url)
            .and_then(url_listing_id)
            .or_else(|| fact.get(CanonicalField::AdId).map(str::to_string))
    }
}

/// Last run of five or more digits in a listing URL
pub fn url_listing_id(url: &str) -> Option<String> {
    URL_LISTING_ID.find_iter(url).last().map(|m| m.as_str().to_string())
}

/// Shared `listing_id` for platforms whose export carries a native ad id
pub(crate) fn ad_id_first(fact: &CanonicalFact) -> Option<String> {
    fact.get(CanonicalField::AdId)
        .map(str::to_string)
        .or_else(|| fact.get(CanonicalField::Url).and_then(url_listing_id))
}
