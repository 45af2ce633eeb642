mod hub;
mod pipeline;
mod registry;
mod session;
mod signaling;

pub use hub::ProctorHub;
pub use pipeline::{AlertPipeline, Dispatch};
pub use registry::{ClientSender, ConnectionId, ConnectionRegistry, Role};
pub use session::ProctorSession;
pub use signaling::{AlertKind, ClientEvent, ServerEvent, TabSwitchEvent, TeacherAlert, UNKNOWN_EXAM, UNKNOWN_STUDENT};
