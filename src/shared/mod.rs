pub mod terminal_id;

pub use terminal_id::session_handle_name;
