pub mod color;
pub mod logging;
pub mod url;
