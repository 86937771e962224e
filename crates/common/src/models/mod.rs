pub mod change_event;
pub mod notification;
pub mod signal;

pub use change_event::{ChangeEvent, ChangeKind};
pub use notification::NotificationIntent;
pub use signal::{Side, Signal};
