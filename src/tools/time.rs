use std::{convert::Infallible, sync::Arc};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use chrono_tz::{TZ_VARIANTS, Tz};
use rig::{completion::ToolDefinition, tool::Tool};
use schemars::JsonSchema;
use serde::Deserialize;

use super::{Clock, SystemClock, parameters_schema};

pub const LOCAL: &str = "local";

/// Common abbreviations that are not zone names on their own.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("EST", "US/Eastern"),
    ("PST", "US/Pacific"),
    ("CST", "US/Central"),
    ("MST", "US/Mountain"),
    ("GMT", "GMT"),
    ("BST", "Europe/London"),
    ("CET", "Europe/Paris"),
    ("JST", "Asia/Tokyo"),
];

fn default_timezone() -> String {
    LOCAL.to_owned()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TimeArgs {
    /// The timezone (optional, defaults to local time). Examples: 'UTC', 'US/Eastern',
    /// 'Europe/London', 'Asia/Tokyo', or 'local' for system timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Where a requested timezone name ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedZone {
    Local,
    Named { zone: Tz, label: String },
}

/// Resolve a user-supplied zone: `local`, an IANA name (any case), or a known abbreviation.
pub fn resolve_timezone(requested: &str) -> Option<ResolvedZone> {
    if requested.eq_ignore_ascii_case(LOCAL) {
        return Some(ResolvedZone::Local);
    }

    if let Some(zone) = find_zone(requested) {
        return Some(ResolvedZone::Named {
            zone,
            label: requested.to_owned(),
        });
    }

    let upper = requested.to_uppercase();
    ABBREVIATIONS
        .iter()
        .find(|(abbreviation, _)| *abbreviation == upper)
        .and_then(|(_, name)| {
            find_zone(name).map(|zone| ResolvedZone::Named {
                zone,
                label: (*name).to_owned(),
            })
        })
}

fn find_zone(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok().or_else(|| {
        TZ_VARIANTS
            .iter()
            .copied()
            .find(|zone| zone.name().eq_ignore_ascii_case(name))
    })
}

pub fn unknown_timezone_message(requested: &str) -> String {
    format!(
        "Unknown timezone: {requested}. Please use standard timezone names like 'UTC', 'US/Eastern', 'Europe/London', etc."
    )
}

/// Render the time block. `utc_offset` is `None` for naive local time.
pub fn time_report(time: NaiveDateTime, zone_label: &str, utc_offset: Option<String>) -> String {
    format!(
        "Current Time Information:\n\
         Date: {}\n\
         Time: {}\n\
         Timezone: {zone_label}\n\
         Day: {}\n\
         UTC Offset: {}",
        time.format("%Y-%m-%d"),
        time.format("%H:%M:%S"),
        time.format("%A"),
        utc_offset.as_deref().unwrap_or("N/A"),
    )
}

pub struct TimeTool {
    clock: Arc<dyn Clock>,
}

impl TimeTool {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    pub fn current_time(&self, requested: &str) -> String {
        let now: DateTime<Utc> = self.clock.now();
        match resolve_timezone(requested) {
            Some(ResolvedZone::Local) => {
                time_report(now.with_timezone(&Local).naive_local(), "Local System Time", None)
            }
            Some(ResolvedZone::Named { zone, label }) => {
                let zoned = now.with_timezone(&zone);
                time_report(
                    zoned.naive_local(),
                    &label,
                    Some(zoned.format("%z").to_string()),
                )
            }
            None => unknown_timezone_message(requested),
        }
    }
}

impl Default for TimeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for TimeTool {
    const NAME: &'static str = "get_current_time";

    type Error = Infallible;
    type Args = TimeArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_owned(),
            description: "Get the current time and date in the specified timezone".to_owned(),
            parameters: parameters_schema::<TimeArgs>(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(self.current_time(&args.timezone))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::tools::MockClock;

    fn tool_at(year: i32, month: u32, day: u32, hour: u32) -> TimeTool {
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .returning(move || Utc.with_ymd_and_hms(year, month, day, hour, 30, 5).unwrap());
        TimeTool::with_clock(clock)
    }

    #[test]
    fn iana_names_keep_the_requested_label() {
        let report = tool_at(2024, 1, 10, 15).current_time("Europe/London");

        assert_eq!(
            report,
            "Current Time Information:\n\
             Date: 2024-01-10\n\
             Time: 15:30:05\n\
             Timezone: Europe/London\n\
             Day: Wednesday\n\
             UTC Offset: +0000"
        );
    }

    #[test]
    fn abbreviations_map_to_zones() {
        let report = tool_at(2024, 7, 1, 12).current_time("pst");

        assert!(report.contains("Timezone: US/Pacific"));
        assert!(report.contains("Time: 05:30:05"));
        assert!(report.contains("UTC Offset: -0700"));
    }

    #[test]
    fn zone_names_are_case_insensitive() {
        let report = tool_at(2024, 1, 1, 0).current_time("asia/tokyo");

        assert!(report.contains("Timezone: asia/tokyo"));
        assert!(report.contains("UTC Offset: +0900"));
    }

    #[test]
    fn local_time_has_no_offset() {
        let report = tool_at(2024, 1, 1, 0).current_time("LOCAL");

        assert!(report.contains("Timezone: Local System Time"));
        assert!(report.ends_with("UTC Offset: N/A"));
    }

    #[test]
    fn unknown_zone_is_explained() {
        let report = tool_at(2024, 1, 1, 0).current_time("XYZ");

        assert_eq!(report, unknown_timezone_message("XYZ"));
        assert!(report.starts_with("Unknown timezone: XYZ."));
    }

    #[test]
    fn omitted_timezone_defaults_to_local() {
        let args: TimeArgs = serde_json::from_str("{}").unwrap();
        assert_eq!(args.timezone, LOCAL);
    }
}
