//! Weather alert rules and the farmer-facing message formatter.

pub mod format;
pub mod rules;

pub use format::{format_crop_alert, format_weather_alert, CropAlert};
pub use rules::evaluate_alerts;
