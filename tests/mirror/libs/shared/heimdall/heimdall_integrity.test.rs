// [tests/mirror/libs/shared/heimdall/heimdall_integrity.test.rs]
use heimdall::init_tracing;

// This test file compiles to its own binary, so the global subscriber and
// panic hook installed here don't leak into any other test target.
#[test]
fn init_tracing_installs_without_panicking() {
    init_tracing("heimdall-integrity-test");
    tracing::info!("tracing is live");
}
