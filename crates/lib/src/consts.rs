/// Application name used for directory layout and environment overrides.
pub const APP_NAME: &str = "keg";
