pub mod archive;
pub mod run;
