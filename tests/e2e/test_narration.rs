use crate::e2e::helpers;

use helpers::{long_story, premium_voice, EnvelopeStyle, TestContext};
use pretty_assertions::assert_eq;
use story_narrator::domain::narration::JobStatus;
use story_narrator::error::AppError;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_create_audio_from_remote_synthesis(ctx: &mut TestContext) {
    let narration = ctx.narration(premium_voice(), 2);
    narration.manager.initialize(long_story()).unwrap();

    let state = narration.manager.create_audio().await.unwrap();

    assert_eq!(state.job_status, JobStatus::Ready);
    assert_eq!(state.units_total, 4);
    assert_eq!(state.units_completed, 4);
    assert!(state.has_audio_file);

    let mut chunk_indices: Vec<u64> = ctx
        .remote
        .requests()
        .iter()
        .map(|request| request["chunkIndex"].as_u64().unwrap())
        .collect();
    chunk_indices.sort_unstable();
    assert_eq!(chunk_indices, vec![0, 1, 2, 3]);

    let first = &ctx.remote.requests()[0];
    assert_eq!(first["voiceId"], "Joanna");
    assert_eq!(first["language"], "en");
    assert_eq!(first["storyIndex"], 2);
    assert_eq!(first["artifactId"], helpers::ARTIFACT_ID);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_unwrap_gateway_envelopes(ctx: &mut TestContext) {
    ctx.remote.set_envelope(EnvelopeStyle::Gateway);
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize("A fox crossed the frozen river.").unwrap();

    let state = narration.manager.create_audio().await.unwrap();

    assert_eq!(state.job_status, JobStatus::Ready);
    assert_eq!(state.units_completed, 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_skip_units_the_remote_rejects(ctx: &mut TestContext) {
    ctx.remote.fail_chunks(&[2]);
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize(long_story()).unwrap();

    let state = narration.manager.create_audio().await.unwrap();

    assert_eq!(state.job_status, JobStatus::Ready);
    assert_eq!(state.units_completed, 3);
    assert_eq!(state.units_failed, 1);
    assert!(state.warning.unwrap().contains("1 of 4"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_an_error_when_every_unit_fails(ctx: &mut TestContext) {
    ctx.remote.fail_chunks(&[0, 1, 2, 3]);
    let narration = ctx.narration(premium_voice(), 0);
    narration.manager.initialize(long_story()).unwrap();

    let result = narration.manager.create_audio().await;

    assert!(matches!(result, Err(AppError::Synthesis(_))));
    let state = narration.manager.get_state();
    assert_eq!(state.job_status, JobStatus::Error);
    assert!(state.error.is_some());
    assert!(!state.has_audio_file);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_detect_the_narration_language(ctx: &mut TestContext) {
    let narration = ctx.narration(premium_voice(), 0);
    narration
        .manager
        .initialize("Había una vez un pequeño zorro que vivía en el bosque con su familia.")
        .unwrap();

    narration.manager.create_audio().await.unwrap();

    assert_eq!(ctx.remote.requests()[0]["language"], "es");
}
