pub mod annotation;
pub mod detection;
pub mod identity;
pub mod pipeline;
pub mod reid;
pub mod shared;
pub mod video;
