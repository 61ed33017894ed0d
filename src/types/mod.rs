pub mod candle;
pub mod event;
pub mod prediction;
pub mod trend;

pub use candle::*;
pub use event::*;
pub use prediction::*;
pub use trend::*;
