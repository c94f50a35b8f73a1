use octograph_domain::domain::{Point, PointFields, PointTags, Reading, SeriesKind, TariffRate};
use time::UtcOffset;

/// Largest value of the meter's 24-bit fixed-point register (0xFFFFFF / 1000).
/// Meters report it on error or overflow; it is never real consumption.
pub const METER_ERROR_SENTINEL: f64 = 16777.215;

/// Half-hour intervals the daily standing charge is spread across.
pub const HALF_HOURS_PER_DAY: f64 = 48.0;

pub fn is_meter_error(consumption: f64) -> bool {
    (consumption - METER_ERROR_SENTINEL).abs() < 1e-9
}

/// Prices every reading of one series, preserving input order.
///
/// Pure: the same readings and rate always give the same points.
pub fn transform(series: SeriesKind, readings: &[Reading], rate: &TariffRate) -> Vec<Point> {
    readings
        .iter()
        .map(|reading| to_point(series, reading, rate))
        .collect()
}

/// Pure pricing of a single reading.
///
/// Rules:
/// - the meter error sentinel counts as zero consumption.
/// - volume readings are converted to kWh before pricing.
/// - `total_cost` carries one half-hour's share of the daily standing charge.
pub fn to_point(series: SeriesKind, reading: &Reading, rate: &TariffRate) -> Point {
    let mut consumption = if is_meter_error(reading.consumption) {
        0.0
    } else {
        reading.consumption
    };
    if let Some(factor) = rate.conversion_factor {
        consumption *= factor;
    }

    let cost = consumption * rate.unit_rate;
    let standing_share = rate.standing_charge_per_day / HALF_HOURS_PER_DAY;

    let end_utc = reading.interval_end.to_offset(UtcOffset::UTC);

    Point {
        measurement: series,
        timestamp: reading.interval_end,
        tags: PointTags {
            active_rate: series.rate_field(),
            time_of_day: format!("{:02}:{:02}", end_utc.hour(), end_utc.minute()),
        },
        fields: PointFields {
            consumption,
            cost,
            total_cost: cost + standing_share,
            standing_charge: rate.standing_charge_per_day,
            unit_charge: rate.unit_rate,
        },
    }
}
