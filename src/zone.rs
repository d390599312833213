//! Timezone identifiers for geo-partitioned keys.
//!
//! A [`ZoneSource`] reports the identifiers of the caller's current
//! timezone. Geo-partitioned caches append them to every key, so the same
//! arguments evaluated under two timezones are cached separately.

use chrono::Local;
use std::env;

/// Supplies the current timezone identifier(s).
///
/// Called once per key construction, so implementations should be cheap.
/// The identifiers must be stable for as long as the timezone does not change.
pub trait ZoneSource: Send + Sync {
    /// Returns the current timezone identifiers, most specific first.
    fn zone_names(&self) -> Vec<String>;
}

/// The process-local timezone.
///
/// Reports zone names, never offsets, while any name is known: the `TZ`
/// environment variable when it is set and non-empty, then the system's
/// IANA zone (for example `Europe/London`) when it differs. Only when
/// neither is available does it fall back to the current UTC offset, which
/// moves at DST changes and is shared by unrelated zones.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalZone;

impl ZoneSource for LocalZone {
    fn zone_names(&self) -> Vec<String> {
        local_names(
            env::var("TZ").ok(),
            iana_time_zone::get_timezone().ok(),
            || Local::now().offset().to_string(),
        )
    }
}

fn local_names(
    tz: Option<String>,
    system: Option<String>,
    offset: impl FnOnce() -> String,
) -> Vec<String> {
    let mut names = Vec::with_capacity(2);
    for name in [tz, system].into_iter().flatten() {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        names.push(offset());
    }
    names
}

/// A timezone pinned to fixed identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedZone {
    names: Vec<String>,
}

impl FixedZone {
    /// Creates a source that always reports `names`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FixedZone {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ZoneSource for FixedZone {
    fn zone_names(&self) -> Vec<String> {
        self.names.clone()
    }
}
