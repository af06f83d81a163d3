//! Integration tests for sample building and sitemap expansion.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use seodeploy_core::fakes::{MemorySitemapFetcher, StaticPopulation};
use seodeploy_core::sampling::load_sample_file;
use seodeploy_core::{
    sample_size, PopulationSource, SamplePath, Sampler, SamplingError, SitemapSource,
};

fn urlset(locs: &[&str]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><urlset>");
    for loc in locs {
        xml.push_str(&format!("<url><loc>{loc}</loc></url>"));
    }
    xml.push_str("</urlset>");
    xml
}

fn index(locs: &[&str]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><sitemapindex>");
    for loc in locs {
        xml.push_str(&format!("<sitemap><loc>{loc}</loc></sitemap>"));
    }
    xml.push_str("</sitemapindex>");
    xml
}

#[tokio::test]
async fn test_sitemap_expands_depth_first_in_document_order() {
    let fetcher = MemorySitemapFetcher::new()
        .with_document(
            "https://ex.com/sitemap.xml",
            &index(&["https://ex.com/pages.xml", "https://ex.com/posts.xml.gz"]),
        )
        .with_document(
            "https://ex.com/pages.xml",
            &urlset(&["https://ex.com/", "https://ex.com/about/"]),
        )
        .with_document(
            "https://ex.com/posts.xml.gz",
            &urlset(&["https://ex.com/blog/a", "https://ex.com/blog/b"]),
        );

    let source = SitemapSource::new("https://ex.com/sitemap.xml", fetcher);
    let urls = source.discover(None).await.expect("discover");
    assert_eq!(
        urls,
        vec![
            "https://ex.com/",
            "https://ex.com/about/",
            "https://ex.com/blog/a",
            "https://ex.com/blog/b",
        ]
    );
}

#[tokio::test]
async fn test_cyclic_sitemaps_are_fetched_once() {
    let fetcher = MemorySitemapFetcher::new()
        .with_document(
            "https://ex.com/a.xml",
            &index(&["https://ex.com/b.xml", "https://ex.com/page-a"]),
        )
        .with_document(
            "https://ex.com/b.xml",
            &index(&["https://ex.com/a.xml", "https://ex.com/page-b"]),
        );

    let source = SitemapSource::new("https://ex.com/a.xml", fetcher);
    let urls = source.discover(None).await.expect("terminates");
    assert_eq!(urls, vec!["https://ex.com/page-b", "https://ex.com/page-a"]);
}

#[tokio::test]
async fn test_nested_fetch_failure_is_skipped_but_root_failure_is_fatal() {
    let fetcher = MemorySitemapFetcher::new().with_document(
        "https://ex.com/sitemap.xml",
        &index(&["https://ex.com/gone.xml", "https://ex.com/kept"]),
    );
    let source = SitemapSource::new("https://ex.com/sitemap.xml", fetcher);
    assert_eq!(
        source.discover(None).await.expect("partial"),
        vec!["https://ex.com/kept"]
    );

    let missing_root = SitemapSource::new("https://ex.com/nope.xml", MemorySitemapFetcher::new());
    assert!(matches!(
        missing_root.discover(None).await,
        Err(SamplingError::Fetch { .. })
    ));
}

#[tokio::test]
async fn test_limit_stops_expansion() {
    let fetcher = MemorySitemapFetcher::new()
        .with_document(
            "https://ex.com/sitemap.xml",
            &index(&["https://ex.com/one.xml", "https://ex.com/two.xml"]),
        )
        .with_document(
            "https://ex.com/one.xml",
            &urlset(&["https://ex.com/1", "https://ex.com/2", "https://ex.com/3"]),
        )
        .with_document("https://ex.com/two.xml", &urlset(&["https://ex.com/4"]));

    let source = SitemapSource::new("https://ex.com/sitemap.xml", fetcher);
    let urls = source.discover(Some(2)).await.expect("discover");
    assert_eq!(urls, vec!["https://ex.com/1", "https://ex.com/2"]);
}

#[tokio::test]
async fn test_sampler_draws_persists_and_reloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("path_samples.txt");
    let population: Vec<String> = (0..500).map(|i| format!("https://Ex.com/p/{i}?v=1")).collect();
    let source = StaticPopulation::new(population.clone());

    let sampler = Sampler::new(&file, 95.0, 5.0);
    let mut rng = StdRng::seed_from_u64(7);
    let drawn = sampler
        .get_sample_paths_with_rng(Some(&source), &mut rng)
        .await
        .expect("sample");

    let expected = sample_size(500, 95.0, 5.0).expect("size");
    assert_eq!(drawn.len(), expected);
    let unique: HashSet<&SamplePath> = drawn.iter().collect();
    assert_eq!(unique.len(), drawn.len());
    assert!(drawn.iter().all(|p| p.as_str().starts_with("/p/") && p.as_str().ends_with("?v=1")));

    // Original relative order is kept.
    let positions: Vec<usize> = drawn
        .iter()
        .map(|p| {
            p.as_str()
                .trim_start_matches("/p/")
                .trim_end_matches("?v=1")
                .parse()
                .expect("index")
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(load_sample_file(&file).expect("persisted"), drawn);

    // Second call reuses the file even without a source.
    let reloaded = sampler.get_sample_paths(None).await.expect("reload");
    assert_eq!(reloaded, drawn);
}

#[tokio::test]
async fn test_small_population_is_sampled_whole() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sampler = Sampler::new(dir.path().join("s.txt"), 99.0, 1.0);
    let source = StaticPopulation::new(["https://ex.com/a", "https://ex.com/b"]);

    let drawn = sampler.get_sample_paths(Some(&source)).await.expect("sample");
    assert_eq!(drawn, vec![SamplePath::from("/a"), SamplePath::from("/b")]);
}

#[tokio::test]
async fn test_sampler_requires_a_source_and_a_population() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sampler = Sampler::new(dir.path().join("s.txt"), 95.0, 5.0);

    assert!(matches!(
        sampler.get_sample_paths(None).await,
        Err(SamplingError::MissingPopulationSource { .. })
    ));

    let empty = StaticPopulation::new(Vec::<String>::new());
    assert!(matches!(
        sampler.get_sample_paths(Some(&empty)).await,
        Err(SamplingError::EmptyPopulation)
    ));
    assert!(!dir.path().join("s.txt").exists());
}

#[tokio::test]
async fn test_url_limit_caps_population() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sampler = Sampler::new(dir.path().join("s.txt"), 50.0, 50.0).with_limit(Some(3));
    let source = StaticPopulation::new((0..100).map(|i| format!("https://ex.com/{i}")));

    let drawn = sampler.get_sample_paths(Some(&source)).await.expect("sample");
    assert!(drawn.len() <= 3);
    assert!(drawn
        .iter()
        .all(|p| ["/0", "/1", "/2"].contains(&p.as_str())));
}
