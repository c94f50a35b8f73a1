use time::OffsetDateTime;

/// One half-hourly consumption reading as reported by the metering API.
///
/// `consumption` is in the meter's native unit: kWh for electricity and
/// SMETS1 gas meters, m³ for SMETS2 gas meters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Reading {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub interval_start: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub interval_end: OffsetDateTime,
    pub consumption: f64,
}
