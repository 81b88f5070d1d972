pub mod config;
pub mod db;
pub mod errors;
pub mod model;
pub mod rest;
pub mod sensors;
pub mod serialize;
pub mod temperatures;
pub mod validate;
