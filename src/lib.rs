//! R2 Uplink Library
//!
//! Moves files between a local filesystem and Cloudflare R2 (through its
//! S3-compatible API), and fetches single files from a dataset hub.
//!
//! # Features
//!
//! - **Size-Based Strategy**: one `PutObject` up to the threshold, multipart above it
//! - **Atomic Visibility**: multipart objects appear only after the final complete call
//! - **Bounded Memory**: one part buffered at a time
//! - **Explicit Configuration**: credentials are passed in, never read from ambient state
//! - **Preflight Diagnostics**: credential, bucket and public URL checks
//!
//! # Example
//!
//! ```no_run
//! use r2_uplink::config::{Config, EnvMap};
//! use r2_uplink::s3::{S3Client, S3ClientConfig};
//! use r2_uplink::upload::{TransferRequest, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let env = EnvMap::from_process().with_dotenv_file(".env")?;
//!     let config = Config::from_env(&env)?;
//!     let client = S3Client::new(S3ClientConfig::from_r2(&config.r2)?)?;
//!
//!     let request = TransferRequest::builder("ct_scan.nii.gz", "imaging", "ct_scan.nii.gz")
//!         .with_config(&config.upload)
//!         .build()?;
//!     Uploader::new(client).upload(&request).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod hub;
pub mod metrics;
pub mod s3;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use upload::{TransferRequest, UploadResult, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
