pub mod domain;
pub mod error;
pub mod options;
pub mod result;
pub mod traits;
pub mod types;

pub use domain::*;
pub use error::*;
pub use options::*;
pub use result::*;
pub use traits::*;
pub use types::*;
