mod preview_command;
pub use preview_command::*;

mod recognize_command;
pub use recognize_command::*;

mod session_command;
pub use session_command::*;
