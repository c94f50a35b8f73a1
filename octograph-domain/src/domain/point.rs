use time::OffsetDateTime;

use super::SeriesKind;

/// Cost-annotated time-series point derived from one [`Reading`](super::Reading).
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: SeriesKind,
    /// End of the half-hour interval the reading covers.
    pub timestamp: OffsetDateTime,
    pub tags: PointTags,
    pub fields: PointFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointTags {
    /// Tariff field the cost was priced against.
    pub active_rate: &'static str,
    /// `HH:MM` of the interval end, UTC.
    pub time_of_day: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointFields {
    /// kWh, after any volume conversion.
    pub consumption: f64,
    pub cost: f64,
    /// `cost` plus this interval's share of the daily standing charge.
    pub total_cost: f64,
    /// Unamortized daily standing charge.
    pub standing_charge: f64,
    pub unit_charge: f64,
}
