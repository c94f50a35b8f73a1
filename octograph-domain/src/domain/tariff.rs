/// Per-series pricing, fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TariffRate {
    pub standing_charge_per_day: f64,
    pub unit_rate: f64,
    /// m³ → kWh multiplier, only set for meters reporting volume.
    pub conversion_factor: Option<f64>,
}

impl TariffRate {
    /// Builds the m³ → kWh factor from the gas transporter's published
    /// volume correction factor and calorific value (MJ/m³).
    pub fn gas_conversion_factor(volume_correction_factor: f64, calorific_value: f64) -> f64 {
        volume_correction_factor * calorific_value / 3.6
    }
}
