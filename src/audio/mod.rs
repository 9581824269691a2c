pub mod bridge;
pub mod device;
pub mod dispatch;
pub mod registry;
pub mod selector;

pub use bridge::{
    DefaultDeviceChanged, DeviceAdded, DeviceRemoved, DeviceStateChanged,
    EndpointNotificationBridge, EndpointNotificationSubscription, PropertyValueChanged,
};
pub use device::{AudioDevice, DataFlow, DeviceRole, DeviceState};
pub use dispatch::{DispatchJob, Dispatcher, InlineDispatcher, ThreadDispatcher};
pub use registry::{DeviceRegistry, RegistryChange};
pub use selector::{DeviceSelector, SelectionChanged, SelectorMode};
