use crate::e2e::helpers;

use helpers::{premium_voice, wait_until, wav_fixture, TestContext};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::time::Duration;
use story_narrator::domain::narration::VoicePreference;
use story_narrator::domain::persistence::audio_key;
use story_narrator::domain::playback::{PlayOptions, PlaybackBackend};
use story_narrator::error::AppError;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_play_the_local_track_until_it_ends(ctx: &mut TestContext) {
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize("The bell rang once.").unwrap();
    narration.manager.create_audio().await.unwrap();

    narration.manager.play(PlayOptions::default()).await.unwrap();
    let state = narration.manager.get_state();
    assert!(state.is_playing);
    assert_eq!(state.backend, Some(PlaybackBackend::LocalTrack));

    let state = wait_until(&narration.manager, Duration::from_secs(3), |s| !s.is_playing).await;
    assert!(!state.is_playing);
    assert_eq!(state.backend, None);
    assert_eq!(state.error, None);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_stream_the_durable_track_through_the_cdn_once(ctx: &mut TestContext) {
    ctx.remote.cdn_enabled.store(true, Ordering::SeqCst);
    let key = audio_key(&ctx.target(0), "wav");
    ctx.remote
        .insert_object(&key, wav_fixture(Duration::from_secs(5)), "audio/wav");

    let narration = ctx.narration(VoicePreference::System, 0);
    narration.manager.initialize("The bell rang once.").unwrap();
    narration.manager.update_remote_key(key).unwrap();

    narration.manager.play(PlayOptions::durable()).await.unwrap();
    assert_eq!(
        narration.manager.get_state().backend,
        Some(PlaybackBackend::RemoteTrack)
    );
    narration.manager.stop();

    narration.manager.play(PlayOptions::durable()).await.unwrap();
    assert!(narration.manager.get_state().is_playing);

    assert_eq!(ctx.remote.cdn_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.remote.storage_downloads.load(Ordering::SeqCst), 0);
    assert_eq!(narration.speech.speaking_text(), None);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fall_back_to_storage_when_the_cdn_misses(ctx: &mut TestContext) {
    let key = audio_key(&ctx.target(0), "wav");
    ctx.remote
        .insert_object(&key, wav_fixture(Duration::from_secs(5)), "audio/wav");

    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.update_remote_key(key).unwrap();

    narration.manager.play(PlayOptions::default()).await.unwrap();

    assert_eq!(
        narration.manager.get_state().backend,
        Some(PlaybackBackend::RemoteTrack)
    );
    assert_eq!(ctx.remote.cdn_downloads.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.remote.storage_downloads.load(Ordering::SeqCst), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_a_missing_durable_track(ctx: &mut TestContext) {
    let narration = ctx.narration(premium_voice(), 0);
    narration
        .manager
        .update_remote_key(audio_key(&ctx.target(0), "wav"))
        .unwrap();

    let result = narration.manager.play(PlayOptions::default()).await;

    assert!(matches!(result, Err(AppError::Storage(_))));
    let state = narration.manager.get_state();
    assert!(!state.is_playing);
    assert!(state.error.is_some());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_stop_the_voice_when_switching_to_a_premium_voice(ctx: &mut TestContext) {
    let narration = ctx.narration(VoicePreference::System, 0);
    narration
        .manager
        .initialize("A very long tale that the voice engine will take a while to read aloud.")
        .unwrap();

    narration.manager.play(PlayOptions::default()).await.unwrap();
    assert!(narration.speech.speaking_text().is_some());

    let state = narration.manager.set_voice_preference(premium_voice()).unwrap();

    assert!(!state.is_playing);
    assert!(!state.uses_on_device_voice);
    assert_eq!(narration.speech.speaking_text(), None);

    let result = narration.manager.play(PlayOptions::default()).await;
    assert!(matches!(result, Err(AppError::NoAudioSource)));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fall_silent_after_destroy(ctx: &mut TestContext) {
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize("The bell rang once.").unwrap();
    narration.manager.create_audio().await.unwrap();
    narration.manager.play(PlayOptions::default()).await.unwrap();

    let notifications = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = notifications.clone();
    let _subscription = narration.manager.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let before = notifications.load(Ordering::SeqCst);

    narration.manager.destroy();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(notifications.load(Ordering::SeqCst), before);
    assert_eq!(narration.media.audible(), None);
}
