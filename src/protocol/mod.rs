mod codec;
mod command;

pub use codec::{read_line, write_banner, write_bye, write_data, write_err, write_ok, write_ok_value};
pub use command::{parse, Command, ParseError};
