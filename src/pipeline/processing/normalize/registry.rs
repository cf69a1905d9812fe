use super::platforms::{
    ChampdogsProfile, ForeverpuppyProfile, FreeadsProfile, GumtreeProfile, KennelClubProfile,
    PetifyProfile, Pets4homesProfile, PlatformProfile, PrelovedProfile, PuppiesProfile,
};

/// Registry of per-platform profiles, kept in processing order.
pub struct PlatformRegistry {
    profiles: Vec<Box<dyn PlatformProfile>>,
}

impl PlatformRegistry {
    /// Create a registry with the nine built-in platforms in processing order
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Box::new(Pets4homesProfile));
        registry.register(Box::new(GumtreeProfile));
        registry.register(Box::new(FreeadsProfile));
        registry.register(Box::new(PrelovedProfile));
        registry.register(Box::new(KennelClubProfile));
        registry.register(Box::new(ForeverpuppyProfile));
        registry.register(Box::new(PetifyProfile));
        registry.register(Box::new(PuppiesProfile));
        registry.register(Box::new(ChampdogsProfile));

        registry
    }

    pub fn empty() -> Self {
        Self { profiles: Vec::new() }
    }

    /// Register a profile. Re-registering an id replaces it in place,
    /// keeping its processing position.
    pub fn register(&mut self, profile: Box<dyn PlatformProfile>) {
        match self.profiles.iter().position(|p| p.id() == profile.id()) {
            Some(idx) => self.profiles[idx] = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn get(&self, platform: &str) -> Option<&dyn PlatformProfile> {
        self.profiles
            .iter()
            .find(|p| p.id() == platform)
            .map(|p| p.as_ref())
    }

    /// Processing position of a platform; unknown platforms sort last
    pub fn rank(&self, platform: &str) -> usize {
        self.profiles
            .iter()
            .position(|p| p.id() == platform)
            .unwrap_or(self.profiles.len())
    }

    pub fn profiles(&self) -> impl Iterator<Item = &dyn PlatformProfile> {
        self.profiles.iter().map(|p| p.as_ref())
    }

    /// List all registered platform ids in processing order
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.profiles.iter().map(|p| p.id()).collect()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
