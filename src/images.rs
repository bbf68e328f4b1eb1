use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{info, warn};

use crate::config::ImageConfig;
use crate::models::CandidateImage;
use crate::utils::error::{AppError, Result};

/// Metadata for one stored product image.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub url: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Downloads candidate images and persists them under
/// `<base>/<brand>/<product>/`, resized and recompressed. Candidates are
/// expected to be URL-deduplicated already (the aggregator does that before
/// any fetch happens).
pub struct ImageStore {
    http: reqwest::Client,
    config: ImageConfig,
}

impl ImageStore {
    pub fn new(config: ImageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    /// Fetch and store every candidate. Per-image failures are logged and
    /// skipped; the result only carries what actually landed on disk.
    pub async fn store_all(
        &self,
        brand: &str,
        product: &str,
        images: &[CandidateImage],
    ) -> Vec<StoredImage> {
        let mut stored = Vec::new();
        for (index, candidate) in images.iter().enumerate() {
            match self.store_one(brand, product, candidate, index + 1).await {
                Ok(image) => stored.push(image),
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "image skipped");
                }
            }
        }
        info!(
            brand,
            product,
            stored = stored.len(),
            requested = images.len(),
            "images persisted"
        );
        stored
    }

    async fn store_one(
        &self,
        brand: &str,
        product: &str,
        candidate: &CandidateImage,
        index: usize,
    ) -> Result<StoredImage> {
        let bytes = self
            .http
            .get(&candidate.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| AppError::Image(format!("undecodable image {}: {}", candidate.url, e)))?;
        let resized = self.shrink_to_fit(decoded);

        let folder = Path::new(&self.config.base_folder)
            .join(sanitize_component(brand))
            .join(sanitize_component(product));
        std::fs::create_dir_all(&folder)?;

        let base_name = format!("{}_{}", sanitize_component(product), index);
        let path = unique_path(&folder, &base_name, "jpg");

        let rgb = resized.to_rgb8();
        let file = std::fs::File::create(&path)?;
        let mut writer = std::io::BufWriter::new(file);
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, self.config.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| AppError::Image(format!("save failed: {}", e)))?;

        Ok(StoredImage {
            url: candidate.url.clone(),
            path,
            width: resized.width(),
            height: resized.height(),
        })
    }

    fn shrink_to_fit(&self, img: DynamicImage) -> DynamicImage {
        let max = self.config.max_dimension;
        if img.width().max(img.height()) > max {
            img.resize(max, max, FilterType::Lanczos3)
        } else {
            img
        }
    }
}

/// Keep file names portable: path separators and control characters out.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// First free `<base>.<ext>`, `<base>_1.<ext>`, `<base>_2.<ext>`, ...
fn unique_path(folder: &Path, base_name: &str, extension: &str) -> PathBuf {
    let mut candidate = folder.join(format!("{}.{}", base_name, extension));
    let mut counter = 1;
    while candidate.exists() {
        candidate = folder.join(format!("{}_{}.{}", base_name, counter, extension));
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_component_replaces_separators() {
        assert_eq!(sanitize_component("Xerjoff"), "Xerjoff");
        assert_eq!(sanitize_component("Naxos 100ml"), "Naxos 100ml");
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
    }

    #[test]
    fn unique_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "shot", "jpg");
        assert_eq!(first, dir.path().join("shot.jpg"));

        std::fs::write(&first, b"x").unwrap();
        let second = unique_path(dir.path(), "shot", "jpg");
        assert_eq!(second, dir.path().join("shot_1.jpg"));

        std::fs::write(&second, b"x").unwrap();
        let third = unique_path(dir.path(), "shot", "jpg");
        assert_eq!(third, dir.path().join("shot_2.jpg"));
    }

    #[tokio::test]
    async fn store_all_survives_unfetchable_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(ImageConfig {
            base_folder: dir.path().to_string_lossy().to_string(),
            max_dimension: 500,
            jpeg_quality: 85,
        })
        .unwrap();

        let images = vec![CandidateImage::new(
            "http://127.0.0.1:1/unreachable.jpg",
            crate::models::ImageRole::ResultThumbnail,
        )];
        let stored = store.store_all("Brand", "Product", &images).await;
        assert!(stored.is_empty());
    }
}
