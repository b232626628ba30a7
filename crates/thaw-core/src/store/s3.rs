//! S3-compatible archive store backed by `aws-sdk-s3`.
//!
//! Connects to AWS or to any S3-compatible endpoint (path-style addressing is
//! always forced). TLS certificate verification can be disabled for endpoints
//! with self-signed certificates.

use std::ops::Range;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};

use super::{ArchiveStore, ObjectPage, ObjectReader, target};
use crate::error::{Error, Result};
use crate::object::{
    BucketDescriptor, ObjectDescriptor, ObjectStatus, RestoreStatus, StorageClass,
};

/// Default region when neither a flag nor `AWS_REGION` supplies one.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default credential profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Session-level connection settings.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Service endpoint URL; `None` uses the SDK's regional endpoint.
    pub endpoint: Option<String>,
    /// Region name.
    pub region: String,
    /// Credential profile name.
    pub profile: String,
    /// HTTP proxy URL. Accepted but not applied to the transport.
    pub proxy: Option<String>,
    /// Accept any server certificate.
    pub skip_tls_verification: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            proxy: None,
            skip_tls_verification: false,
        }
    }
}

/// Archive store speaking the S3 API.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Builds a client from the credential profile and connection settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint is not an `http` or
    /// `https` URL.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        if let Some(endpoint) = &config.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(Error::configuration(format!(
                    "endpoint must be an http or https URL: {endpoint}"
                )));
            }
        }
        if let Some(proxy) = &config.proxy {
            tracing::warn!(proxy = %proxy, "proxy is configured but not applied to the transport");
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .profile_name(&config.profile)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.skip_tls_verification {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.http_client(insecure_http_client());
        }

        tracing::debug!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "S3 client configured"
        );
        Ok(Self::from_client(Client::from_conf(builder.build())))
    }

    /// Wraps an already configured client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Certificate verifier that accepts every server certificate.
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

fn insecure_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    let tls = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .build();
    HyperClientBuilder::new().build(connector)
}

/// Maps an SDK error into a communication error, keeping the service code.
fn sdk_error<E>(operation: &'static str, target: impl Into<String>, err: E) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(&err).to_string(), str::to_string);
    Error::Communication {
        operation,
        target: target.into(),
        code,
        message,
        source: Some(Box::new(err)),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn to_size(raw: Option<i64>) -> u64 {
    raw.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

#[async_trait]
impl ArchiveStore for S3Store {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error("list_buckets", "*", e))?;
        Ok(output
            .buckets()
            .iter()
            .map(|bucket| BucketDescriptor {
                name: bucket.name().unwrap_or_default().to_string(),
                created: bucket.creation_date().and_then(to_chrono),
            })
            .collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error("list_objects", bucket, e))?;

        let objects = output
            .contents()
            .iter()
            .map(|object| ObjectDescriptor {
                key: object.key().unwrap_or_default().to_string(),
                size: to_size(object.size()),
                storage_class: StorageClass::parse(
                    object.storage_class().map_or("", |c| c.as_str()),
                ),
                last_modified: object.last_modified().and_then(to_chrono),
            })
            .collect();

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation_token,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectStatus> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("head_object", target(bucket, key), e))?;

        let restore_header = output.restore().map(str::to_string);
        Ok(ObjectStatus {
            key: key.to_string(),
            size: to_size(output.content_length()),
            storage_class: StorageClass::parse(output.storage_class().map_or("", |c| c.as_str())),
            last_modified: output.last_modified().and_then(to_chrono),
            restore: RestoreStatus::parse(restore_header.as_deref()),
            restore_header,
        })
    }

    async fn restore_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .restore_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("restore_object", target(bucket, key), e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("get_object", target(bucket, key), e))?;
        Ok(Box::new(output.body.into_async_read()))
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: Range<u64>,
    ) -> Result<Bytes> {
        if range.end <= range.start {
            return Err(Error::configuration(format!(
                "invalid range {}..{}",
                range.start, range.end
            )));
        }
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={}-{}", range.start, range.end - 1))
            .send()
            .await
            .map_err(|e| sdk_error("get_object_range", target(bucket, key), e))?;

        // The response arrived; a failed body read still counts as a response.
        match output.body.collect().await {
            Ok(body) => Ok(body.into_bytes()),
            Err(err) => {
                tracing::debug!(bucket, key, error = %err, "range body read failed");
                Ok(Bytes::new())
            }
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("delete_object", target(bucket, key), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_cli_defaults() {
        let config = S3Config::default();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.profile, "default");
        assert!(config.endpoint.is_none());
        assert!(!config.skip_tls_verification);
    }

    #[tokio::test]
    async fn endpoint_without_scheme_is_rejected() {
        let config = S3Config {
            endpoint: Some("ds3.example.com".into()),
            ..S3Config::default()
        };
        let err = S3Store::connect(&config).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn negative_sizes_clamp_to_zero() {
        assert_eq!(to_size(Some(-1)), 0);
        assert_eq!(to_size(None), 0);
        assert_eq!(to_size(Some(42)), 42);
    }

    #[test]
    fn sdk_timestamps_convert() {
        let dt = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        let converted = to_chrono(&dt).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
