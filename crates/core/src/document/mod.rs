pub mod filters;
pub mod meta;
pub mod status;

pub use status::DocStatus;
