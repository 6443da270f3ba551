pub mod camera;
pub mod capture;
pub mod detection;
pub mod errors;
pub mod labels;
pub mod model;
pub mod stream;
