//! Process environment resolution for the paths and defaults the wider
//! system reads from its surrounding environment.

use std::path::PathBuf;

/// `MLT_DATA`: data directory for YAML service metadata and luma images.
/// Falls back to a user data directory located via the `dirs` crate.
pub fn data_dir() -> PathBuf {
    std::env::var_os("MLT_DATA")
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|d| d.join("mlt")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `MLT_PROFILE`: name of the default video profile.
pub fn default_profile_name() -> Option<String> {
    std::env::var("MLT_PROFILE").ok()
}

/// `MLT_REPOSITORY`: module directory for plugin discovery. This crate does
/// not load plugins itself, but the path is still resolved here so a host
/// embedding it can pass it to its own plugin loader.
pub fn repository_dir() -> Option<PathBuf> {
    std::env::var_os("MLT_REPOSITORY").map(PathBuf::from)
}

/// `MLT_AVFORMAT_PRODUCER_CACHE`: default per-key cache depth for AV-decode
/// services (consumed by `mlt-cache`'s default capacity).
pub fn avformat_producer_cache_depth() -> usize {
    std::env::var("MLT_AVFORMAT_PRODUCER_CACHE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_depth_defaults_to_four() {
        std::env::remove_var("MLT_AVFORMAT_PRODUCER_CACHE");
        assert_eq!(avformat_producer_cache_depth(), 4);
    }
}
