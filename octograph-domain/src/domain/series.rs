use std::fmt;

/// One metering commodity stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeriesKind {
    Electricity,
    Gas,
}

impl SeriesKind {
    /// Measurement name used by the time-series store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Gas => "gas",
        }
    }

    /// Name of the tariff field priced against this series.
    pub fn rate_field(&self) -> &'static str {
        match self {
            Self::Electricity => "unit_rate_electricity",
            Self::Gas => "unit_rate_gas",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
