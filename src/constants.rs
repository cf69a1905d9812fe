/// Platform identifiers, in processing order.
///
/// Processing order is the stable tie-break for "first non-empty wins"
/// mapping and "keep first" deduplication, so the order of `PLATFORMS`
/// is part of the output contract.
pub const PETS4HOMES: &str = "pets4homes";
pub const GUMTREE: &str = "gumtree";
pub const FREEADS: &str = "freeads";
pub const PRELOVED: &str = "preloved";
pub const KENNEL_CLUB: &str = "kennel_club";
pub const FOREVERPUPPY: &str = "foreverpuppy";
pub const PETIFY: &str = "petify";
pub const PUPPIES: &str = "puppies";
pub const CHAMPDOGS: &str = "champdogs";

pub const PLATFORMS: [&str; 9] = [
    PETS4HOMES,
    GUMTREE,
    FREEADS,
    PRELOVED,
    KENNEL_CLUB,
    FOREVERPUPPY,
    PETIFY,
    PUPPIES,
    CHAMPDOGS,
];

/// Shared identity for listings without a seller name or location
pub const UNKNOWN_SELLER_KEY: &str = "UNKNOWN|UNKNOWN";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "DOG_MARKET_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Version tag written into every metrics document
pub const METRICS_SCHEMA_VERSION: &str = "metrics_snapshot.v1";

/// Multi-valued cells in the derived table are joined with this
pub const LIST_SEPARATOR: char = ';';

/// Get all supported platform ids
pub fn get_supported_platforms() -> Vec<&'static str> {
    PLATFORMS.to_vec()
}

/// Position of a platform in processing order
pub fn platform_rank(platform: &str) -> Option<usize> {
    PLATFORMS.iter().position(|p| *p == platform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_processing_order() {
        assert_eq!(platform_rank(PETS4HOMES), Some(0));
        assert_eq!(platform_rank(CHAMPDOGS), Some(8));
        assert_eq!(platform_rank("ebay"), None);
        assert_eq!(get_supported_platforms().len(), 9);
    }
}
