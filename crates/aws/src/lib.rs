//! S3 backend for contact photo storage.
//!
//! [`S3BlobStore`] implements [`contacts_blob::BlobStore`] on top of the AWS
//! SDK. Region, static credentials and an endpoint override (`LocalStack`,
//! `MinIO`) are configured through [`AwsBaseConfig`](config::AwsBaseConfig).

pub mod auth;
pub mod config;
pub mod error;
pub mod s3;

pub use config::AwsBaseConfig;
pub use error::AwsBlobError;
pub use s3::{S3BlobStore, S3Config};
