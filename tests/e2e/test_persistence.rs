use crate::e2e::helpers;

use helpers::{premium_voice, TestContext};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use story_narrator::domain::narration::JobStatus;
use story_narrator::domain::persistence::{audio_key, stories_record_key, ALTERNATE_CONTENT_TYPE};
use test_context::test_context;

fn stories_record(ctx: &TestContext, story_index: usize) -> Value {
    let object = ctx
        .remote
        .object(&stories_record_key(&ctx.target(story_index)))
        .expect("stories record was written");
    serde_json::from_slice(&object.bytes).unwrap()
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_upload_the_track_and_patch_the_stories_record(ctx: &mut TestContext) {
    let narration = ctx.narration(premium_voice(), 1);
    narration.manager.initialize("The lantern maker slept.").unwrap();

    narration.manager.create_audio().await.unwrap();
    narration.manager.wait_for_persistence().await;

    let key = audio_key(&ctx.target(1), "wav");
    assert!(key.starts_with("public/eu-west-1:1f2e3d4c-0000-4000-8000-abcdefabcdef/artifact_42/"));

    let state = narration.manager.get_state();
    assert_eq!(state.remote_key.as_deref(), Some(key.as_str()));
    assert!(!state.is_persisting);
    assert_eq!(state.warning, None);

    let object = ctx.remote.object(&key).expect("track was uploaded");
    assert_eq!(object.content_type, "audio/wav");
    assert_eq!(&object.bytes[..4], b"RIFF");

    let record = stories_record(ctx, 1);
    let entries = record.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["story_audio"], "");
    assert_eq!(entries[1]["story_audio"], "story_audio_2.wav");
    assert!(entries[1]["audio_updated_at"].is_string());

    assert_eq!(
        *narration.listener.assigned.lock().unwrap(),
        vec![(1, "story_audio_2.wav".to_string())]
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_existing_story_details(ctx: &mut TestContext) {
    let record = json!([
        {"culture": "Norse", "view": "Saga", "culture_story": "Odin wandered...", "story_audio": "", "illustration": "odin.png"},
        {"culture": "Inuit", "view": "Myth", "culture_story": "Sedna sank...", "story_audio": ""}
    ]);
    ctx.remote.insert_object(
        &stories_record_key(&ctx.target(0)),
        record.to_string().into_bytes(),
        "application/json",
    );
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize("Odin wandered the nine worlds.").unwrap();

    narration.manager.create_audio().await.unwrap();
    narration.manager.wait_for_persistence().await;

    let record = stories_record(ctx, 0);
    assert_eq!(record[0]["story_audio"], "story_audio_1.wav");
    assert_eq!(record[0]["illustration"], "odin.png");
    assert_eq!(record[0]["culture"], "Norse");
    assert_eq!(record[1]["culture_story"], "Sedna sank...");
    assert_eq!(record[1]["story_audio"], "");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_retry_a_rejected_upload_as_raw_bytes(ctx: &mut TestContext) {
    ctx.remote.rejected_typed_puts.store(1, Ordering::SeqCst);
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize("The tide came in.").unwrap();

    narration.manager.create_audio().await.unwrap();
    narration.manager.wait_for_persistence().await;

    let key = audio_key(&ctx.target(0), "wav");
    let object = ctx.remote.object(&key).expect("track was uploaded");
    assert_eq!(object.content_type, ALTERNATE_CONTENT_TYPE);
    assert_eq!(narration.manager.get_state().remote_key, Some(key));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_local_playback_when_the_upload_fails(ctx: &mut TestContext) {
    ctx.remote.reject_all_puts.store(true, Ordering::SeqCst);
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize("The tide came in.").unwrap();

    narration.manager.create_audio().await.unwrap();
    narration.manager.wait_for_persistence().await;

    let state = narration.manager.get_state();
    assert_eq!(state.job_status, JobStatus::Ready);
    assert_eq!(state.remote_key, None);
    assert!(state.warning.is_some());
    assert!(!state.is_persisting);
    assert!(narration.listener.assigned.lock().unwrap().is_empty());

    narration.manager.play(Default::default()).await.unwrap();
    assert!(narration.manager.get_state().is_playing);
}
