//! Cloud Logging filter construction

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// Log severity, ordered as Cloud Logging orders it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub const ALL: [Severity; 9] = [
        Severity::Default,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == upper)
            .ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

/// Closed time interval; `start <= end` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The `hours` leading up to `end`
    pub fn last_hours(end: DateTime<Utc>, hours: u32) -> Self {
        Self {
            start: end - Duration::hours(i64::from(hours)),
            end,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Builder for the Cloud Logging query language.
///
/// Every clause is joined with `AND`; string values are quoted and escaped.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    resource_type: Option<String>,
    service_name: Option<String>,
    min_severity: Option<Severity>,
    window: Option<TimeWindow>,
    text: Option<String>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    #[must_use]
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    #[must_use]
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    #[must_use]
    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Free-text term matched against every field of the entry
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn build(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(resource_type) = &self.resource_type {
            clauses.push(format!("resource.type={}", quote(resource_type)));
        }
        if let Some(service) = &self.service_name {
            clauses.push(format!("resource.labels.service_name={}", quote(service)));
        }
        if let Some(severity) = self.min_severity {
            clauses.push(format!("severity>={severity}"));
        }
        if let Some(window) = &self.window {
            clauses.push(format!("timestamp>={}", quote(&window.start_rfc3339())));
            clauses.push(format!("timestamp<={}", quote(&window.end_rfc3339())));
        }
        if let Some(text) = &self.text {
            clauses.push(quote(text));
        }
        clauses.join(" AND ")
    }
}

impl fmt::Display for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_default_error_filter_for_last_day() {
        let filter = LogFilter::new()
            .resource_type("cloud_run_revision")
            .service_name("api-service")
            .min_severity(Severity::Error)
            .window(TimeWindow::last_hours(fixed_now(), 24));

        assert_eq!(
            filter.build(),
            "resource.type=\"cloud_run_revision\" AND \
             resource.labels.service_name=\"api-service\" AND \
             severity>=ERROR AND \
             timestamp>=\"2025-03-13T12:00:00Z\" AND \
             timestamp<=\"2025-03-14T12:00:00Z\""
        );
    }

    #[test]
    fn test_empty_filter() {
        assert_eq!(LogFilter::new().build(), "");
    }

    #[test]
    fn test_quotes_are_escaped() {
        let filter = LogFilter::new().text(r#"KeyError: "user_id" in C:\app"#);
        assert_eq!(filter.build(), r#""KeyError: \"user_id\" in C:\\app""#);
    }

    #[test]
    fn test_blank_text_is_ignored() {
        assert_eq!(LogFilter::new().text("   ").build(), "");
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!(" Warning ".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
        assert!(Severity::Critical > Severity::Error);
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let now = fixed_now();
        assert!(TimeWindow::new(now, now - Duration::hours(1)).is_none());
        assert!(TimeWindow::new(now, now).is_some());
    }

    proptest! {
        #[test]
        fn prop_window_is_bounded_and_ordered(hours in 0u32..=24 * 365, offset in 0i64..1_000_000_000) {
            let end = Utc.timestamp_opt(1_600_000_000 + offset, 0).unwrap();
            let window = TimeWindow::last_hours(end, hours);
            prop_assert!(window.start() <= window.end());
            prop_assert_eq!(window.end() - window.start(), Duration::hours(i64::from(hours)));
        }

        #[test]
        fn prop_quoted_values_stay_balanced(text in "[ -~]{1,40}") {
            prop_assume!(!text.trim().is_empty());
            let built = LogFilter::new().text(text.clone()).build();
            prop_assert!(built.starts_with('"'));
            prop_assert!(built.ends_with('"'));
            // Every quote inside the value is escaped
            let inner = &built[1..built.len() - 1];
            let unescaped = inner
                .replace("\\\\", "")
                .replace("\\\"", "");
            prop_assert!(!unescaped.contains('"'));
        }

        #[test]
        fn prop_clauses_joined_with_and(service in "[a-z][a-z0-9-]{0,20}", hours in 1u32..=720) {
            let filter = LogFilter::new()
                .resource_type("cloud_run_revision")
                .service_name(service)
                .min_severity(Severity::Error)
                .window(TimeWindow::last_hours(fixed_now(), hours))
                .build();
            prop_assert_eq!(filter.matches(" AND ").count(), 4);
            prop_assert!(filter.contains("timestamp>=\""));
            prop_assert!(filter.contains("timestamp<=\""));
        }
    }
}
