//! Outbound collaborators of the advisory service.
//!
//! - **Notifications** (`notify`) - SMS and WhatsApp channels behind one `Notifier`
//! - **Weather** (`weather`) - current conditions from OpenWeather or a deterministic mock
//!
//! Every channel and provider has a mock counterpart that is selected when credentials
//! are absent, so a fresh checkout runs end to end without any external account.

pub mod notify;
pub mod weather;

pub use notify::{
    ChannelError, ChannelKind, ChannelReport, DeliveryMode, DeliveryStatus, MockChannel,
    NotificationChannel, Notifier, TwilioSmsChannel, WhatsAppChannel,
};
pub use weather::{
    provider_from_config, MockWeatherProvider, OpenWeatherProvider, WeatherError, WeatherProvider,
};
