//! The process-wide singletons a framework embedding needs — exposed here
//! as an explicit handle rather than hidden globals, owned by whatever
//! starts the first consumer instead of a static.

use std::sync::Arc;

use mlt_cache::ServiceCache;
use mlt_core::{env, Profile};

/// Resolves `name` against the profile presets this core ships. Unknown
/// names fall back to the default profile and are logged rather than
/// aborting.
fn resolve_profile(name: &str) -> Profile {
    match name {
        "atsc_720p_25" => Profile::atsc_720p_25(),
        "dv_pal" => Profile::dv_pal(),
        other => {
            log::warn!("unknown profile {other:?}, falling back to the default profile");
            Profile::default()
        }
    }
}

/// Owns the service cache and default profile for one embedding of the
/// framework. Constructed explicitly by whatever starts the first
/// consumer; torn down when dropped.
pub struct Engine {
    cache: Arc<ServiceCache>,
    profile: Profile,
}

impl Engine {
    pub fn new(profile: Profile) -> Self {
        Self {
            cache: Arc::new(ServiceCache::default()),
            profile,
        }
    }

    /// Resolves `MLT_PROFILE` and `MLT_AVFORMAT_PRODUCER_CACHE` from the
    /// process environment.
    pub fn from_env() -> Self {
        let profile = env::default_profile_name()
            .map(|name| resolve_profile(&name))
            .unwrap_or_default();
        Self::new(profile)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn cache(&self) -> &Arc<ServiceCache> {
        &self.cache
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Profile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_falls_back_to_default_profile_when_unset() {
        std::env::remove_var("MLT_PROFILE");
        let engine = Engine::from_env();
        assert_eq!(engine.profile().name, Profile::default().name);
    }

    #[test]
    fn unknown_profile_name_falls_back_without_panicking() {
        std::env::set_var("MLT_PROFILE", "not_a_real_profile");
        let engine = Engine::from_env();
        assert_eq!(engine.profile().name, Profile::default().name);
        std::env::remove_var("MLT_PROFILE");
    }
}
