pub mod connection_handler;

pub use connection_handler::{
    normalize_line, read_line, CloseReason, ConnectionHandler, LineOutcome, QUIT_COMMAND,
};
