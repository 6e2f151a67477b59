// End-to-end tests for the story narrator
//
// Each test gets its own axum server standing in for the remote synthesis
// endpoint and the durable object storage (plus its CDN front), started
// through test-context lifecycle hooks. Narrations run with the headless
// playback adapters, so timing follows the real clock.

mod helpers;
mod test_narration;
mod test_persistence;
mod test_playback;
