pub mod io;
pub mod paths;
pub mod process;
