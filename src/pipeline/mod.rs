pub mod entities;
pub mod formatter;
pub mod intent;
pub mod mapper;
pub mod normalizer;
pub mod planner;
