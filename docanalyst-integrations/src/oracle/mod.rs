//! Language-model oracle backed by siumai.
//!
//! [`OracleFactory`] turns an [`LlmConfig`](docanalyst_core::config::LlmConfig)
//! into siumai chat clients; [`SiumaiOracle`] implements
//! [`LanguageModel`](docanalyst_core::traits::LanguageModel) on top of them.

mod client;
mod factory;

pub use client::SiumaiOracle;
pub use factory::OracleFactory;
