pub mod artifact;
pub mod manifest;
pub mod run;
pub mod target;
