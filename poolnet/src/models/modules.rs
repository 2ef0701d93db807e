mod conv_relu;
mod convert;
mod deep_pool;
mod score;

pub use conv_relu::*;
pub use convert::*;
pub use deep_pool::*;
pub use score::*;
