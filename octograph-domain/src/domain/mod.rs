pub mod point;
pub mod reading;
pub mod series;
pub mod tariff;

pub use point::{Point, PointFields, PointTags};
pub use reading::Reading;
pub use series::SeriesKind;
pub use tariff::TariffRate;
