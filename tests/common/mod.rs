#![allow(dead_code)]

pub mod builders;
pub mod mock_platform;
pub mod strategies;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use mock_platform::*;
