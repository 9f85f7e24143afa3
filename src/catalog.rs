//! Portfolio catalog
//!
//! Builds the gallery's image list from the object store and filters it by
//! category without going back to storage.

use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    category::{Category, CategoryFilter},
    storage::object,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioImage {
    /// Storage path, unique per image.
    pub id: String,
    pub url: url::Url,
    pub category: Category,
    pub file_name: String,
}

async fn list_category<O: object::Client>(
    client: &O,
    category: Category,
) -> Result<Vec<PortfolioImage>, O::Error> {
    let blobs = client.list(category.as_str()).await?;
    debug!(%category, count = blobs.len(), "listed category");
    let tasks = blobs.into_iter().map(|blob| async move {
        let url = client.resolve_url(&blob).await?;
        Ok::<_, O::Error>(PortfolioImage {
            id: blob.full_path,
            url,
            category,
            file_name: blob.name,
        })
    });
    try_join_all(tasks).await
}

/// Lists every category and resolves each blob to a URL.
///
/// A category whose listing or resolution fails is logged and left out; the
/// rest of the catalog is still returned. Results are grouped in
/// [`Category::ALL`] order.
pub async fn build_catalog<O: object::Client>(client: &O) -> Vec<PortfolioImage> {
    let results = join_all(
        Category::ALL
            .into_iter()
            .map(|category| list_category(client, category)),
    )
    .await;
    Category::ALL
        .into_iter()
        .zip(results)
        .flat_map(|(category, result)| {
            result
                .inspect_err(|error| warn!(%category, %error, "failed to fetch category images"))
                .unwrap_or_default()
        })
        .collect()
}

/// Images matching `selected`, in their original order.
pub fn filter(images: &[PortfolioImage], selected: CategoryFilter) -> Vec<&PortfolioImage> {
    images
        .iter()
        .filter(|image| selected.matches(image.category))
        .collect()
}

/// Loaded catalog plus the current category selection.
#[derive(Debug, Default)]
pub struct Gallery {
    images: Vec<PortfolioImage>,
    selected: CategoryFilter,
}

impl Gallery {
    pub async fn load<O: object::Client>(client: &O) -> Self {
        Self::from_images(build_catalog(client).await)
    }

    pub fn from_images(images: Vec<PortfolioImage>) -> Self {
        Self {
            images,
            selected: CategoryFilter::All,
        }
    }

    pub fn select(&mut self, selected: CategoryFilter) {
        self.selected = selected;
    }

    pub fn selected(&self) -> CategoryFilter {
        self.selected
    }

    pub fn images(&self) -> &[PortfolioImage] {
        &self.images
    }

    pub fn visible(&self) -> Vec<&PortfolioImage> {
        filter(&self.images, self.selected)
    }
}
