//! Integration tests for the composition root.

use super::helpers::{Harness, harness, local_service};
use console_sync::config::{ConsoleConfig, Preferences, Theme};
use console_sync::console::{ConsoleError, HttpConsole};
use console_sync::registry::adapters::HttpRegistryApiError;
use rstest::rstest;

#[rstest]
fn connect_builds_an_http_console_without_calling_out() {
    let mut config = ConsoleConfig::default();
    config.api.base_url = "http://registry.internal:18200/api".to_owned();

    let console = HttpConsole::connect(config).expect("console should connect");

    assert_eq!(
        console.config().api.base_url,
        "http://registry.internal:18200/api"
    );
    assert!(console.services().services().is_empty());
    assert!(!console.errors().has_errors());
}

#[rstest]
fn connect_rejects_unusable_base_urls() {
    let mut config = ConsoleConfig::default();
    config.api.base_url = "registry".to_owned();

    assert!(matches!(
        HttpConsole::connect(config),
        Err(ConsoleError::Api(HttpRegistryApiError::InvalidBaseUrl { .. }))
    ));
}

#[rstest]
fn preferences_round_trip_through_the_local_store(harness: Harness) {
    assert_eq!(harness.console.preferences(), Preferences::default());

    let prefs = Preferences {
        theme: Theme::Dark,
        page_size: 50,
        ..Preferences::default()
    };
    harness
        .console
        .save_preferences(&prefs)
        .expect("preferences should save");

    assert_eq!(harness.reopen().console.preferences(), prefs);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn start_honours_the_auto_refresh_preference(harness: Harness) {
    assert!(!harness.console.start());

    harness
        .console
        .save_preferences(&Preferences {
            auto_refresh: true,
            ..Preferences::default()
        })
        .expect("preferences should save");

    assert!(harness.console.start());
    assert!(harness.console.scheduler().is_auto_refreshing());
    harness.console.shutdown();
    assert!(!harness.console.scheduler().is_auto_refreshing());
}

#[rstest]
#[tokio::test]
async fn stores_share_one_error_log_and_loading_tracker(harness: Harness) {
    harness
        .api
        .seed_services(vec![local_service("svc1", "healthy")])
        .expect("seeding should succeed");
    let console = &harness.console;

    console
        .services()
        .fetch_services(false)
        .await
        .expect("fetch should succeed");
    let missing = console.tools().toggle_favorite("nothing");

    assert!(missing.is_err());
    assert!(!console.loading().is_loading());
    assert_eq!(console.context().errors().error_count(), 0);
    console.shutdown();
    assert!(console.services().services().is_empty());
}
