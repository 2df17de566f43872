pub mod errors;
pub mod models;

pub use errors::Error;
pub use models::{
    FileInfo, FileMap, FunctionDecl, FunctionRecord, LineDecl, SourceFileReport, ToolFamily,
};
