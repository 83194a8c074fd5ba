use std::sync::Arc;

use newswire::store::NewsStore;
use newswire::types::NewArticle;
use tempfile::tempdir;

fn sample(title: &str) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        category: "Technology".to_string(),
        author: "Newsroom".to_string(),
        image: "https://picsum.photos/800/450".to_string(),
        excerpt: "excerpt".to_string(),
        content: "content".to_string(),
    }
}

// Regression test for the id-collision hazard: two creates racing against an
// empty store must serialize behind the document mutex and come out with ids
// 1 and 2, never a duplicate.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_never_collide() {
    let dir = tempdir().unwrap();
    let store = Arc::new(NewsStore::open(dir.path().join("news-data.json")));

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.create(sample("first")).await.unwrap() })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.create(sample("second")).await.unwrap() })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    let mut ids = vec![a.id, b.id];
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);

    let all = store.find_all().await;
    assert_eq!(all.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_counter_bumps_are_all_applied() {
    let dir = tempdir().unwrap();
    let store = Arc::new(NewsStore::open(dir.path().join("news-data.json")));
    let article = store.create(sample("counted")).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = article.id;
        tasks.push(tokio::spawn(async move {
            store.add_like(id).await.unwrap();
            store.increment_views(id).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = store.find_by_id(article.id).await.unwrap();
    assert_eq!(stored.likes, 8);
    assert_eq!(stored.views, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writers_do_not_starve_readers() {
    let dir = tempdir().unwrap();
    let store = Arc::new(NewsStore::open(dir.path().join("news-data.json")));
    store.create(sample("steady")).await.unwrap();

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                store.create(sample(&format!("burst-{}", i))).await.unwrap();
            }
        })
    };

    // Reads never block on the writer; any committed-or-later state is fine.
    for _ in 0..20 {
        let len = store.find_all().await.len();
        assert!((1..=11).contains(&len));
    }
    writer.await.unwrap();
    assert_eq!(store.find_all().await.len(), 11);
}
