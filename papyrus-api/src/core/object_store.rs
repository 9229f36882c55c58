use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::models::error::{ApiError, ApiResult, ErrorCode};

/// Object storage plus plain URL downloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Download a presigned (or any plain HTTP) URL.
    async fn fetch_url(&self, url: &str) -> Result<Bytes>;
}

pub struct S3ObjectStore {
    s3: aws_sdk_s3::Client,
    http: reqwest::Client,
}

impl S3ObjectStore {
    pub fn new(s3: aws_sdk_s3::Client) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self { s3, http })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let output = self
            .s3
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))?;

        let body = output.body.collect().await?.into_bytes();
        debug!("Downloaded s3://{}/{} ({} bytes)", bucket, key, body.len());
        Ok(body)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let size = body.len();
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))?;

        debug!("Uploaded s3://{}/{} ({} bytes)", bucket, key, size);
        Ok(())
    }

    async fn fetch_url(&self, url: &str) -> Result<Bytes> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

/// Split `s3://bucket/key` into bucket and key.
pub fn parse_s3_url(url: &str) -> ApiResult<(String, String)> {
    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| ApiError::transcription(ErrorCode::Download, "Invalid S3 URL"))?;

    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_string(), key.to_string()))
        },
        _ => Err(ApiError::transcription(
            ErrorCode::Download,
            "Invalid S3 URL format",
        )),
    }
}
