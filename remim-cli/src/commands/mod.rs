pub mod permute;
pub mod run;
