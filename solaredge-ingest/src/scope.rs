//! Pre-flight validation of fetch scopes.
//!
//! Pure functions of their inputs: nothing here touches the network. Every violated rule is
//! reported, not just the first.

use std::{collections::HashSet, fmt};

use solaredge_client::domain::{SerialNumber, SiteId, TimeUnit, TimeWindow};
use solaredge_client::timefmt::format_timestamp;
use time::PrimitiveDateTime;

/// Raw scope inputs as they arrive from flags or configuration.
#[derive(Debug, Clone, Default)]
pub struct ScopeRequest {
    pub start_time: Option<PrimitiveDateTime>,
    pub end_time: Option<PrimitiveDateTime>,
    pub by_day: bool,
    pub by_hour: bool,
    pub by_quarter_hour: bool,
    pub all_sites: bool,
    pub site_ids: Vec<String>,
    pub all_equipment: bool,
    pub serial_numbers: Vec<String>,
}

impl ScopeRequest {
    /// Sets exactly the flag for `unit`, clearing the others.
    pub fn select_time_unit(&mut self, unit: TimeUnit) {
        self.by_day = unit == TimeUnit::Day;
        self.by_hour = unit == TimeUnit::Hour;
        self.by_quarter_hour = unit == TimeUnit::QuarterHour;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSelector {
    Explicit(Vec<SiteId>),
    Discover,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialSelector {
    Explicit(Vec<SerialNumber>),
    Discover,
}

/// A validated energy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchScope {
    pub window: TimeWindow,
    pub sites: SiteSelector,
}

/// A validated telemetry request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryScope {
    pub window: TimeWindow,
    pub sites: SiteSelector,
    pub serials: SerialSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeViolation {
    #[error("may only set one of by-day, by-hour, by-quarter-hour")]
    ConflictingTimeUnits,
    #[error("cannot set all-sites and specify site-ids")]
    SitesConflict,
    #[error("must set all-sites or specify at least one site-id")]
    NoSites,
    #[error("site ids must not be blank")]
    BlankSiteId,
    #[error("cannot set all-equipment and specify serials")]
    SerialsConflict,
    #[error("must set all-equipment or specify at least one serial")]
    NoSerials,
    #[error("serial numbers must not be blank")]
    BlankSerial,
    #[error("start time is required")]
    MissingStart,
    #[error("end time is required")]
    MissingEnd,
    #[error("start time {start} must precede end time {end}")]
    EmptyWindow { start: String, end: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<ScopeViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid fetch scope: ")?;
        for (idx, v) in self.violations.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn contains(&self, violation: &ScopeViolation) -> bool {
        self.violations.contains(violation)
    }
}

pub fn validate_energy(request: &ScopeRequest) -> Result<FetchScope, ValidationError> {
    let mut violations = Vec::new();
    let window = window(request, &mut violations);
    let sites = site_selector(request, &mut violations);

    match (window, sites) {
        (Some(window), Some(sites)) if violations.is_empty() => Ok(FetchScope { window, sites }),
        _ => Err(ValidationError { violations }),
    }
}

pub fn validate_telemetry(request: &ScopeRequest) -> Result<TelemetryScope, ValidationError> {
    let mut violations = Vec::new();
    let window = window(request, &mut violations);
    let sites = site_selector(request, &mut violations);
    let serials = serial_selector(request, &mut violations);

    match (window, sites, serials) {
        (Some(window), Some(sites), Some(serials)) if violations.is_empty() => Ok(TelemetryScope {
            window,
            sites,
            serials,
        }),
        _ => Err(ValidationError { violations }),
    }
}

fn time_unit(request: &ScopeRequest, violations: &mut Vec<ScopeViolation>) -> TimeUnit {
    let flags = [
        (request.by_day, TimeUnit::Day),
        (request.by_hour, TimeUnit::Hour),
        (request.by_quarter_hour, TimeUnit::QuarterHour),
    ];
    let mut set = flags.iter().filter(|(on, _)| *on).map(|(_, unit)| *unit);

    match (set.next(), set.next()) {
        (None, _) => TimeUnit::Hour,
        (Some(unit), None) => unit,
        (Some(unit), Some(_)) => {
            violations.push(ScopeViolation::ConflictingTimeUnits);
            unit
        }
    }
}

fn window(request: &ScopeRequest, violations: &mut Vec<ScopeViolation>) -> Option<TimeWindow> {
    let time_unit = time_unit(request, violations);

    if request.start_time.is_none() {
        violations.push(ScopeViolation::MissingStart);
    }
    if request.end_time.is_none() {
        violations.push(ScopeViolation::MissingEnd);
    }
    let (start, end) = (request.start_time?, request.end_time?);

    if start >= end {
        violations.push(ScopeViolation::EmptyWindow {
            start: format_timestamp(start),
            end: format_timestamp(end),
        });
        return None;
    }

    Some(TimeWindow {
        time_unit,
        start,
        end,
    })
}

fn site_selector(request: &ScopeRequest, violations: &mut Vec<ScopeViolation>) -> Option<SiteSelector> {
    explicit_or_discover(
        request.all_sites,
        &request.site_ids,
        violations,
        [
            ScopeViolation::SitesConflict,
            ScopeViolation::NoSites,
            ScopeViolation::BlankSiteId,
        ],
    )
    .map(|selection| match selection {
        Some(ids) => SiteSelector::Explicit(ids),
        None => SiteSelector::Discover,
    })
}

fn serial_selector(
    request: &ScopeRequest,
    violations: &mut Vec<ScopeViolation>,
) -> Option<SerialSelector> {
    explicit_or_discover(
        request.all_equipment,
        &request.serial_numbers,
        violations,
        [
            ScopeViolation::SerialsConflict,
            ScopeViolation::NoSerials,
            ScopeViolation::BlankSerial,
        ],
    )
    .map(|selection| match selection {
        Some(serials) => SerialSelector::Explicit(serials),
        None => SerialSelector::Discover,
    })
}

/// `Some(Some(list))` for an explicit list, `Some(None)` for discovery, `None` when invalid.
/// `[conflict, neither, blank]` are the violations to report.
fn explicit_or_discover(
    discover: bool,
    explicit: &[String],
    violations: &mut Vec<ScopeViolation>,
    [conflict, neither, blank]: [ScopeViolation; 3],
) -> Option<Option<Vec<String>>> {
    match (discover, explicit.is_empty()) {
        (true, false) => {
            violations.push(conflict);
            None
        }
        (true, true) => Some(None),
        (false, true) => {
            violations.push(neither);
            None
        }
        (false, false) => {
            if explicit.iter().any(|id| id.trim().is_empty()) {
                violations.push(blank);
                return None;
            }
            Some(Some(dedupe(explicit.iter().map(|id| id.trim().to_string()))))
        }
    }
}

/// Drops repeats, keeping first occurrences in order.
pub(crate) fn dedupe<I>(items: I) -> Vec<I::Item>
where
    I: IntoIterator,
    I::Item: Clone + Eq + std::hash::Hash,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
