mod archive_search;
mod content;
mod registry;

pub use archive_search::{
    search_archive, session_search_definition, session_search_handler, ActiveArchive,
    DEFAULT_MAX_RESULTS, SESSION_SEARCH_TOOL,
};
pub use content::flatten_tool_result;
pub use registry::{
    local_handler, validate_arguments, LocalHandler, RegisteredTool, ToolKind, ToolRegistry,
};
