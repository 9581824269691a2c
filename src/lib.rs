pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod playback;
pub mod session;
pub mod system;

pub use audio::{DeviceRegistry, DeviceSelector, EndpointNotificationSubscription};
pub use config::Config;
pub use error::{AudioError, AudioResult};
pub use events::{EventChannel, SubscriptionId};
pub use playback::{ReconfigurableRenderer, SourceSwitchProvider};
pub use session::{AudioSession, SessionRegistry};
