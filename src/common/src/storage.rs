use anyhow::Result;
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory};
use std::sync::Arc;
use url::Url;

/// Create the object store serving `bucket` from a storage DSN.
///
/// - `memory://` yields a fresh in-memory store
/// - `file:///root` maps the bucket to the directory `/root/<bucket>`
/// - `s3://[key:secret@]host[:port][/default-bucket]` targets `bucket` on that endpoint
pub fn create_bucket_store(dsn: &str, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let url = parse_dsn(dsn)?;

    if bucket.is_empty() {
        return Err(anyhow::anyhow!("Bucket name cannot be empty"));
    }

    match url.scheme() {
        "file" => {
            let root = file_root(&url)?;
            let dir = std::path::Path::new(&root).join(bucket);
            std::fs::create_dir_all(&dir).map_err(|e| {
                anyhow::anyhow!("Failed to create bucket directory {}: {}", dir.display(), e)
            })?;
            Ok(Arc::new(LocalFileSystem::new_with_prefix(dir)?))
        }
        "memory" => Ok(Arc::new(InMemory::new())),
        "s3" => {
            let builder = create_s3_builder_from_dsn(&url)?.with_bucket_name(bucket);
            Ok(Arc::new(builder.build()?))
        }
        scheme => Err(anyhow::anyhow!(
            "Unsupported storage scheme: {}. Supported: file, memory, s3",
            scheme
        )),
    }
}

/// Check that a DSN is parseable and uses a supported scheme, without
/// constructing any client.
pub fn validate_dsn(dsn: &str) -> Result<()> {
    let url = parse_dsn(dsn)?;
    match url.scheme() {
        "file" => file_root(&url).map(|_| ()),
        "memory" => Ok(()),
        "s3" => url
            .host_str()
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("Missing S3 host in DSN")),
        scheme => Err(anyhow::anyhow!(
            "Unsupported storage scheme: {}. Supported: file, memory, s3",
            scheme
        )),
    }
}

fn parse_dsn(dsn: &str) -> Result<Url> {
    Url::parse(dsn).map_err(|e| anyhow::anyhow!("Invalid storage DSN '{}': {}", dsn, e))
}

fn file_root(url: &Url) -> Result<String> {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return Err(anyhow::anyhow!(
            "File DSN must specify a path: file:///path/to/storage"
        ));
    }
    // Remove leading slash for relative paths like /.data/storage -> .data/storage
    let path = if path.starts_with("/.") {
        &path[1..]
    } else {
        path
    };
    Ok(path.to_string())
}

/// Create an S3 builder from a DSN
/// DSN format: s3://[access_key:secret_key@]host[:port][/bucket]
pub fn create_s3_builder_from_dsn(dsn: &Url) -> Result<AmazonS3Builder> {
    let host = dsn
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Missing S3 host in DSN"))?;
    let port = dsn.port();
    let bucket = dsn.path().trim_start_matches('/');

    let mut builder = AmazonS3Builder::new().with_region("us-east-1");

    if !bucket.is_empty() {
        builder = builder.with_bucket_name(bucket);
    }

    let access_key = dsn.username();
    let secret_key = dsn.password().unwrap_or("");

    if !access_key.is_empty() {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);
    }

    // Real S3 needs no custom endpoint, S3-compatible stores (MinIO, etc) do
    let endpoint = if host.contains("amazonaws.com") {
        None
    } else {
        let scheme = if port == Some(443) { "https" } else { "http" };
        Some(match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        })
    };

    if let Some(endpoint) = endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false); // MinIO requires path-style URLs
    }

    if access_key.is_empty() {
        if let Ok(env_key) = std::env::var("AWS_ACCESS_KEY_ID") {
            builder = builder.with_access_key_id(env_key);
        }
        if let Ok(env_secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            builder = builder.with_secret_access_key(env_secret);
        }
        if let Ok(env_region) = std::env::var("AWS_DEFAULT_REGION") {
            builder = builder.with_region(env_region);
        }
    }

    Ok(builder)
}
