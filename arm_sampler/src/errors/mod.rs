mod campaign_error;
mod io_error;

pub use campaign_error::*;
pub use io_error::*;
