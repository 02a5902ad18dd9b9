pub mod constants;
pub mod velocity;
pub mod util {
    pub mod error;
    pub mod file_utils;
    pub mod model_logger;
    pub mod model_utils;
}

/// Build metadata generated by `built`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
