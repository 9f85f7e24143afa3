use bytes::Bytes;
use url::Url;

use super::FaultyObjects;
use crate::{
    catalog::{Gallery, build_catalog},
    category::{Category, CategoryFilter},
    deploy::local::storage::LocalStorage,
    storage::object::Client as _,
};

async fn seed<O: crate::storage::object::Client>(objects: &O, keys: &[&str]) {
    for key in keys {
        objects
            .put(key, "image/jpeg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn failing_category_is_left_out() {
    let mut objects = FaultyObjects::default();
    objects
        .failing_lists
        .insert(Category::Fashion.as_str().to_owned());
    seed(
        &objects,
        &[
            "Wedding Photography/1_w.jpg",
            "Birthday Photography/1_b.jpg",
            "Fashion Photography/1_f.jpg",
            "Nature Photography/1_n.jpg",
            "Corporate Events/1_c.jpg",
        ],
    )
    .await;

    let images = build_catalog(&objects).await;
    assert_eq!(
        images.iter().map(|image| image.category).collect::<Vec<_>>(),
        [
            Category::Wedding,
            Category::Birthday,
            Category::Nature,
            Category::CorporateEvents,
        ]
    );
    assert_eq!(images[2].id, "Nature Photography/1_n.jpg");
    assert_eq!(images[2].file_name, "1_n.jpg");
    assert_eq!(
        images[2].url.as_str(),
        "memory://objects/Nature%20Photography/1_n.jpg"
    );
}

#[tokio::test]
async fn resolve_failure_drops_whole_category() {
    let objects = FaultyObjects {
        failing_resolves: vec!["2_broken".into()],
        ..Default::default()
    };
    seed(
        &objects,
        &[
            "Nature Photography/1_fine.jpg",
            "Nature Photography/2_broken.jpg",
            "Birthday Photography/3_cake.jpg",
        ],
    )
    .await;

    let images = build_catalog(&objects).await;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].category, Category::Birthday);
}

#[tokio::test]
async fn empty_store_yields_empty_catalog() {
    let objects = FaultyObjects::default();
    assert!(build_catalog(&objects).await.is_empty());
}

#[tokio::test]
async fn gallery_over_local_storage() {
    let storage = LocalStorage::open("sqlite::memory:").await.unwrap();
    let objects = storage.object_client(Url::parse("https://media.example.com/").unwrap());
    seed(
        &objects,
        &[
            "Wedding Photography/10_first.jpg",
            "Wedding Photography/11_second.jpg",
            "Corporate Events/12_gala.jpg",
            "Corporate Events/nested/13_hidden.jpg",
        ],
    )
    .await;

    let mut gallery = Gallery::load(&objects).await;
    assert_eq!(gallery.images().len(), 3);
    assert_eq!(gallery.selected(), CategoryFilter::All);

    gallery.select(Category::CorporateEvents.into());
    let visible = gallery.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(
        visible[0].url.as_str(),
        "https://media.example.com/Corporate%20Events/12_gala.jpg"
    );

    gallery.select("Wedding Photography".parse().unwrap());
    assert_eq!(
        gallery
            .visible()
            .iter()
            .map(|image| image.file_name.as_str())
            .collect::<Vec<_>>(),
        ["10_first.jpg", "11_second.jpg"]
    );
}
