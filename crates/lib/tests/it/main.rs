/*! Integration tests for glimpse.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - api: the HTTP surface, driven over a real socket with reqwest
 * - detect: the detector against images served over HTTP
 * - pipeline: upload then detect, with the failure kinds kept apart
 * - store: credential store behaviour shared by every implementation
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("glimpse=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

mod detect;
mod helpers;
mod pipeline;
mod store;
