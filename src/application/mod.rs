pub mod dto;
pub mod label_repo;
pub mod ports;
pub mod services;
