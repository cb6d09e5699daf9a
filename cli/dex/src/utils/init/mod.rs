mod logger;
mod transport;

pub use logger::*;
pub use transport::*;
