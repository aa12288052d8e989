use anyhow::Result;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

use crate::config::AppConfig;

/// Extensions accepted for post images and profile photos.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Returns the lowercased extension of `filename` if it is on the allow-list.
pub fn image_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_endpoint: Option<String>,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_endpoint: config.s3_public_endpoint.clone(),
        })
    }

    /// Stores validated image bytes under a fresh key and returns the key.
    /// The caller is responsible for extension/content validation; this is
    /// pure blob plumbing.
    pub async fn store_image(
        &self,
        prefix: &str,
        owner_id: Uuid,
        ext: &str,
        data: bytes::Bytes,
    ) -> Result<String> {
        let key = format!("{}/{}/{}.{}", prefix, owner_id, Uuid::new_v4(), ext);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type_for_extension(ext))
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(key)
    }

    pub async fn delete_image(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    /// Public URL for a stored key, if a public endpoint is configured.
    pub fn public_url(&self, key: &str) -> Option<String> {
        let endpoint = self.public_endpoint.as_deref()?;
        let base = url::Url::parse(endpoint).ok()?;
        base.join(&format!("{}/{}", self.bucket, key))
            .ok()
            .map(|url| url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extension_accepts_allow_list() {
        assert_eq!(image_extension("photo.png").as_deref(), Some("png"));
        assert_eq!(image_extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("anim.gif").as_deref(), Some("gif"));
    }

    #[test]
    fn image_extension_rejects_everything_else() {
        assert_eq!(image_extension("script.exe"), None);
        assert_eq!(image_extension("image.bmp"), None);
        assert_eq!(image_extension("no_extension"), None);
        assert_eq!(image_extension(""), None);
    }
}
