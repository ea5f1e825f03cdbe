//! # lzprobe: landing-zone smoke probes
//!
//! `lzprobe` verifies, end to end, that the managed services a cloud landing
//! zone exposes are reachable and functioning from the execution environment,
//! using real credentials. Each subcommand is one probe: a straight-line
//! sequence that resolves a credential, performs a single domain operation
//! against one external service, optionally reads its own write back, and
//! prints the raw result as JSON for the operator.
//!
//! ## The probes
//!
//! - **secret** - fetch a named secret from the vault
//! - **storage** - write a two-row sample table to the data lake, list the
//!   filesystem, read the table back, and compare
//! - **sql** - fetch a database password from the vault, write the sample
//!   table to a relational target, and read it back
//! - **model** - download a model artifact, register it, deploy it (or
//!   package it as an image), and score the resulting endpoint
//! - **score** - POST the question/context payload to a scoring endpoint
//!
//! Probes are run manually, one at a time. There is no scheduling, no
//! concurrency, no retry, and no cleanup of the remote blobs, tables, and
//! services a probe creates - those side effects are the point: they prove
//! the wiring works. Failures from the underlying services propagate to the
//! operator verbatim.
//!
//! ## Credentials
//!
//! Interactive runs use the OAuth device-code flow: the probe prints a code,
//! the operator signs in from a browser, and the probe polls until the
//! prompt completes or times out. The flow sits behind the
//! [`credentials::TokenCredential`] trait so automated harnesses can
//! substitute a pre-acquired token and keep every probe non-interactive.
//! Credentials and clients are constructed per run and never shared.
//!
//! ## Configuration
//!
//! Configuration comes from a YAML file plus `LZPROBE_`-prefixed environment
//! overrides; see the [`config`] module. The shipped defaults are a template:
//! every identifier the operator must fill in is an `<angle-bracket>`
//! placeholder, and each probe refuses to run until its own section is
//! complete.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use lzprobe::credentials::DeviceCodeCredential;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = lzprobe::config::Args::parse();
//!     let config = lzprobe::Config::load(&args)?;
//!
//!     let credential = DeviceCodeCredential::new(&config.identity, config.request_timeout)?;
//!     let report = lzprobe::probes::secret::run(&config, &credential, None).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod probes;
pub mod table;
pub mod telemetry;

pub use config::Config;
pub use errors::{Error, Result};
pub use probes::ProbeReport;
