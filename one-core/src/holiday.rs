//! Public holiday calendar selection by timezone.

pub const US_HOLIDAYS: &str = "en.usa#holiday@group.v.calendar.google.com";
pub const INDIAN_HOLIDAYS: &str = "en.indian#holiday@group.v.calendar.google.com";
pub const JAPANESE_HOLIDAYS: &str = "en.japanese#holiday@group.v.calendar.google.com";
pub const SINGAPORE_HOLIDAYS: &str = "en.singapore#holiday@group.v.calendar.google.com";
pub const CHINESE_HOLIDAYS: &str = "en.china#holiday@group.v.calendar.google.com";
pub const UK_HOLIDAYS: &str = "en.uk#holiday@group.v.calendar.google.com";
pub const GERMAN_HOLIDAYS: &str = "en.german#holiday@group.v.calendar.google.com";
pub const FRENCH_HOLIDAYS: &str = "en.french#holiday@group.v.calendar.google.com";
pub const EUROPEAN_HOLIDAYS: &str = "en.christian#holiday@group.v.calendar.google.com";
pub const AUSTRALIAN_HOLIDAYS: &str = "en.australian#holiday@group.v.calendar.google.com";
pub const NEW_ZEALAND_HOLIDAYS: &str = "en.new_zealand#holiday@group.v.calendar.google.com";

/// Individual zones that get a country calendar instead of their region's.
const ZONE_OVERRIDES: &[(&str, &str)] = &[
    ("Asia/Kolkata", INDIAN_HOLIDAYS),
    ("Asia/Calcutta", INDIAN_HOLIDAYS),
    ("Asia/Tokyo", JAPANESE_HOLIDAYS),
    ("Asia/Singapore", SINGAPORE_HOLIDAYS),
    ("Asia/Shanghai", CHINESE_HOLIDAYS),
    ("Europe/London", UK_HOLIDAYS),
    ("Europe/Berlin", GERMAN_HOLIDAYS),
    ("Europe/Paris", FRENCH_HOLIDAYS),
    ("Pacific/Auckland", NEW_ZEALAND_HOLIDAYS),
];

/// Region prefixes, checked after the overrides.
const REGION_PREFIXES: &[(&str, &str)] = &[
    ("Asia/", INDIAN_HOLIDAYS),
    ("Europe/", EUROPEAN_HOLIDAYS),
    ("Australia/", AUSTRALIAN_HOLIDAYS),
];

/// Map an IANA timezone name to a holiday calendar id.
///
/// Total: any input, including garbage, yields an id. Unmatched zones get US holidays.
pub fn holiday_calendar_for(time_zone: &str) -> &'static str {
    let zone = time_zone.trim();

    if let Some((_, id)) = ZONE_OVERRIDES.iter().find(|(name, _)| *name == zone) {
        return id;
    }

    REGION_PREFIXES
        .iter()
        .find(|(prefix, _)| zone.starts_with(prefix))
        .map(|(_, id)| *id)
        .unwrap_or(US_HOLIDAYS)
}

/// Whether a calendar id or organizer email identifies a public holiday calendar.
pub fn is_holiday_calendar(id: &str) -> bool {
    id.ends_with("#holiday@group.v.calendar.google.com")
}
