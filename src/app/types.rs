use crate::camera::DeviceId;

/// Requests posted to the presentation task by the keyboard handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Capture,
    NextCamera,
    PreviousCamera,
    SwitchDevice(DeviceId),
    /// Model name entry has started
    EditModel,
    SetModel(String),
    Save,
    Quit,
}

/// Why the presentation loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
    Cancelled,
}
