pub mod bingo;
pub mod color;
pub mod session;

pub use bingo::{handle_bingo_command, BingoCommands};
pub use color::{handle_color_command, ColorCommands};
pub use session::{handle_session_command, SessionCommands};
