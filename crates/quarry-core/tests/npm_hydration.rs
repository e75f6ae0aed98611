mod support;

use std::error::Error as _;
use std::fs;

use tokio_util::sync::CancellationToken;

use quarry_core::cache::{CACHE_META_FILE, CacheMeta};
use quarry_core::error::{ErrorKind, ProcessFailure};
use quarry_core::npm::{LISTING_FILE, LISTING_UNAVAILABLE, OVERVIEW_FILE};
use quarry_core::reference::parse_reference;

use support::{FakeInstaller, FakeRegistry, Harness, REGISTRY, WEBSITE, npm_resource};

fn react_registry() -> FakeRegistry {
    let registry = FakeRegistry::new();
    registry.publish("react", "19.0.0", &["18.3.1", "19.0.0"]);
    registry
}

#[tokio::test]
async fn pinned_resource_fetches_and_installs_once() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let descriptor = npm_resource("react", "react", Some("19.0.0"));
    let cancel = CancellationToken::new();

    let first = h.facade.hydrate(&descriptor, &cancel).await.unwrap();
    let second = h.facade.hydrate(&descriptor, &cancel).await.unwrap();

    assert_eq!(first.path(), second.path());
    assert_eq!(h.registry.calls_to(&format!("{REGISTRY}/react")), 1);
    assert_eq!(h.installer.runs(), 1);
    assert!(second.path().join("README.md").exists());
}

#[tokio::test]
async fn unpinned_resource_refetches_every_time() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let descriptor = npm_resource("react", "react", None);
    let cancel = CancellationToken::new();

    h.facade.hydrate(&descriptor, &cancel).await.unwrap();
    h.facade.hydrate(&descriptor, &cancel).await.unwrap();

    assert_eq!(h.registry.calls_to(&format!("{REGISTRY}/react")), 2);
    assert_eq!(h.installer.runs(), 2);
    assert_eq!(h.installer.last_spec().as_deref(), Some("react@19.0.0"));
}

#[tokio::test]
async fn concurrent_requests_for_one_resource_install_once() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let descriptor = npm_resource("react", "react", Some("19.0.0"));
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        h.facade.hydrate(&descriptor, &cancel),
        h.facade.hydrate(&descriptor, &cancel)
    );

    assert_eq!(a.unwrap().path(), b.unwrap().path());
    assert_eq!(h.installer.runs(), 1);
}

#[tokio::test]
async fn hydration_writes_overview_listing_and_cache_meta() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let resource = h
        .facade
        .hydrate(&npm_resource("react", "react", Some("18.3.1")), &CancellationToken::new())
        .await
        .unwrap();
    let dir = resource.path();

    let overview = fs::read_to_string(dir.join(OVERVIEW_FILE)).unwrap();
    assert!(overview.starts_with("# react"));
    assert!(overview.contains("Version: 18.3.1"));
    assert!(overview.contains("License: MIT"));
    assert!(overview.contains("- loose-envify: ^1.1.0"));

    let listing = fs::read_to_string(dir.join(LISTING_FILE)).unwrap();
    assert!(listing.contains("react@18.3.1"));

    let meta = CacheMeta::read(dir).await.unwrap();
    assert_eq!(meta.package_name, "react");
    assert_eq!(meta.requested_version.as_deref(), Some("18.3.1"));
    assert_eq!(meta.resolved_version, "18.3.1");
    assert_eq!(meta.package_url, format!("{WEBSITE}/package/react"));
    assert_eq!(meta.listing_url, format!("{WEBSITE}/package/react/v/18.3.1"));

    let leftovers: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains("-staging-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn forbidden_listing_page_degrades_to_placeholder() {
    let registry = react_registry();
    registry.respond(format!("{WEBSITE}/package/react/v/19.0.0"), 403, "Forbidden");
    let h = Harness::new(registry, FakeInstaller::new());

    let resource = h
        .facade
        .hydrate(&npm_resource("react", "react", Some("19.0.0")), &CancellationToken::new())
        .await
        .unwrap();

    let listing = fs::read_to_string(resource.path().join(LISTING_FILE)).unwrap();
    assert!(listing.contains(LISTING_UNAVAILABLE));
    assert!(listing.contains("status 403"));
    assert!(resource.path().join(CACHE_META_FILE).exists());
}

#[tokio::test]
async fn unreachable_listing_page_degrades_to_placeholder() {
    let registry = FakeRegistry::new();
    registry.respond(
        format!("{REGISTRY}/react"),
        200,
        support::document_json("react", "19.0.0", &["19.0.0"]),
    );
    let h = Harness::new(registry, FakeInstaller::new());

    let resource = h
        .facade
        .hydrate(&npm_resource("react", "react", None), &CancellationToken::new())
        .await
        .unwrap();

    let listing = fs::read_to_string(resource.path().join(LISTING_FILE)).unwrap();
    assert!(listing.contains("(request failed)"));
}

#[tokio::test]
async fn install_failure_names_spec_and_keeps_output() {
    let h = Harness::new(
        react_registry(),
        FakeInstaller::failing(1, "npm ERR! code ETARGET"),
    );

    let err = h
        .facade
        .hydrate(&npm_resource("react", "react", Some("19.0.0")), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Process);
    assert!(err.message().contains("react@19.0.0"), "{}", err.message());
    assert!(err.hint().is_some());

    let failure = err
        .source()
        .and_then(|s| s.downcast_ref::<ProcessFailure>())
        .expect("process failure cause");
    assert_eq!(failure.exit_code, 1);
    assert!(failure.output.contains("ETARGET"));

    let dir = h.resources_root().join("react");
    assert!(!dir.join(CACHE_META_FILE).exists());
    assert!(!dir.join("README.md").exists());
}

#[tokio::test]
async fn unknown_version_names_requested_string() {
    let h = Harness::new(react_registry(), FakeInstaller::new());

    let err = h
        .facade
        .hydrate(&npm_resource("react", "react", Some("21.0.0-nope")), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::VersionNotFound);
    assert!(err.message().contains("21.0.0-nope"));
    assert_eq!(h.installer.runs(), 0);
}

#[tokio::test]
async fn registry_errors_are_distinguished() {
    let registry = FakeRegistry::new();
    registry.respond(format!("{REGISTRY}/missing-pkg"), 404, "{}");
    registry.respond(format!("{REGISTRY}/flaky-pkg"), 503, "unavailable");
    registry.respond(format!("{REGISTRY}/garbled-pkg"), 200, "<html>");
    let h = Harness::new(registry, FakeInstaller::new());
    let cancel = CancellationToken::new();

    let cases = [
        ("missing-pkg", ErrorKind::NotFound),
        ("flaky-pkg", ErrorKind::HttpStatus),
        ("garbled-pkg", ErrorKind::Parse),
        ("offline-pkg", ErrorKind::Network),
    ];
    for (package, kind) in cases {
        let err = h
            .facade
            .hydrate(&npm_resource(package, package, None), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{package}");
    }

    let offline = h
        .facade
        .hydrate(&npm_resource("offline-pkg", "offline-pkg", None), &cancel)
        .await
        .unwrap_err();
    assert!(offline.hint().unwrap().contains("network"));
}

#[tokio::test]
async fn scoped_package_uses_encoded_registry_path() {
    let registry = FakeRegistry::new();
    registry.publish("@scope/example", "2.10.1", &["2.10.1"]);
    let h = Harness::new(registry, FakeInstaller::new());

    let resource = h
        .facade
        .hydrate(
            &npm_resource("example", "@scope/example", Some("2.10.1")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(h.registry.calls_to(&format!("{REGISTRY}/@scope%2Fexample")), 1);
    assert_eq!(h.installer.last_spec().as_deref(), Some("@scope/example@2.10.1"));
    assert!(resource.path().join("README.md").exists());
}

#[tokio::test]
async fn ephemeral_reference_is_cleaned_up_idempotently() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let descriptor = parse_reference("npm:react@19.0.0").unwrap();

    let resource = h
        .facade
        .hydrate(&descriptor, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resource.fs_name, "registry:react@19.0.0");
    assert!(resource.path().starts_with(h.resources_root().join(".tmp")));
    assert!(resource.path().join("README.md").exists());

    let cleanup = resource.cleanup().expect("ephemeral resources carry a cleanup");
    cleanup.run().await.unwrap();
    assert!(!resource.path().exists());
    cleanup.run().await.unwrap();
}

#[tokio::test]
async fn ephemeral_pinned_reference_never_reuses_cache() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let descriptor = parse_reference("npm:react@19.0.0").unwrap();
    let cancel = CancellationToken::new();

    h.facade.hydrate(&descriptor, &cancel).await.unwrap();
    h.facade.hydrate(&descriptor, &cancel).await.unwrap();

    assert_eq!(h.installer.runs(), 2);
}

#[tokio::test]
async fn failed_ephemeral_hydration_leaves_nothing_behind() {
    let h = Harness::new(react_registry(), FakeInstaller::failing(1, "boom"));
    let descriptor = parse_reference("npm:react@19.0.0").unwrap();

    h.facade
        .hydrate(&descriptor, &CancellationToken::new())
        .await
        .unwrap_err();

    let dir = h.facade.resource_dir(&descriptor).unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn cancelled_request_stops_before_network() {
    let h = Harness::new(react_registry(), FakeInstaller::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .facade
        .hydrate(&npm_resource("react", "react", None), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(h.registry.total_calls(), 0);
    assert_eq!(h.installer.runs(), 0);
}
