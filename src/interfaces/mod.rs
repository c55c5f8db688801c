pub mod plugins;
pub mod providers;
