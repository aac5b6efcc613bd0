pub mod easing;
pub mod scrub_engine;
