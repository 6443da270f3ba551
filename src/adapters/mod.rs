pub mod camera;
pub mod detector;
pub mod http;
pub mod storage;
