pub mod analyze;
pub mod baselines;
pub mod compare;
pub mod config;
pub mod synth;
