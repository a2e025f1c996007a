pub mod rest;

pub use rest::{RestApi, MAX_IMAGE_BYTES};
