use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use story_narrator::domain::audio::{PcmDecoder, TrackStore};
use story_narrator::domain::narration::{
    NarrationDeps, NarrationManager, NarrationSettings, NarrationTarget, VoicePreference,
};
use story_narrator::domain::persistence::{
    AudioAssignmentListener, PersistenceCoordinator, VerificationPolicy,
};
use story_narrator::domain::playback::{NarrationState, PlaybackTimings};
use story_narrator::domain::synthesis::{RetryPolicy, SynthesisClient};
use story_narrator::infrastructure::playback::{HeadlessMediaSink, HeadlessSpeechEngine};
use story_narrator::infrastructure::repositories::{HttpObjectStorage, HttpSynthesisRepository};
use test_context::AsyncTestContext;
use tokio::net::TcpListener;

pub mod fake_remote;

pub use fake_remote::{wav_fixture, EnvelopeStyle, FakeRemote, FAKE_SAMPLE_RATE};

pub const USER_ID: &str = "eu-west-1:1f2e3d4c-0000-4000-8000-abcdefabcdef";
pub const ARTIFACT_ID: &str = "artifact 42";

#[derive(Default)]
pub struct RecordingListener {
    pub assigned: Mutex<Vec<(usize, String)>>,
}

#[async_trait]
impl AudioAssignmentListener for RecordingListener {
    async fn on_audio_assigned(&self, story_index: usize, filename: &str) {
        self.assigned
            .lock()
            .unwrap()
            .push((story_index, filename.to_string()));
    }
}

/// One narration wired against the fake remote, plus its adapters
pub struct Narration {
    pub manager: NarrationManager,
    pub speech: Arc<HeadlessSpeechEngine>,
    pub media: Arc<HeadlessMediaSink>,
    pub listener: Arc<RecordingListener>,
}

pub struct TestContext {
    pub remote: Arc<FakeRemote>,
    pub base_url: String,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let remote = Arc::new(FakeRemote::new());
            let app = fake_remote::router(remote.clone());

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self { remote, base_url }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {
            // Server task ends with the test runtime
        }
    }
}

impl TestContext {
    pub fn target(&self, story_index: usize) -> NarrationTarget {
        NarrationTarget::new(USER_ID, ARTIFACT_ID, story_index)
    }

    pub fn storage(&self) -> Arc<HttpObjectStorage> {
        Arc::new(
            HttpObjectStorage::new(
                format!("{}/storage", self.base_url),
                Some(format!("{}/cdn", self.base_url)),
                Duration::from_secs(5),
            )
            .expect("Failed to build storage client"),
        )
    }

    pub fn narration(&self, voice: VoicePreference, story_index: usize) -> Narration {
        let repository = HttpSynthesisRepository::new(
            format!("{}/synthesize", self.base_url),
            Duration::from_secs(5),
        )
        .expect("Failed to build synthesis client");

        let speech = Arc::new(HeadlessSpeechEngine::new());
        let media = Arc::new(HeadlessMediaSink::new());
        let listener = Arc::new(RecordingListener::default());

        let deps = NarrationDeps {
            synthesis: Arc::new(SynthesisClient::new(
                Arc::new(repository),
                PcmDecoder::new(FAKE_SAMPLE_RATE),
            )),
            persistence: Arc::new(PersistenceCoordinator::new(
                self.storage(),
                Arc::new(TrackStore::new()),
                VerificationPolicy {
                    attempts: 3,
                    initial_delay: Duration::from_millis(20),
                },
            )),
            speech: speech.clone(),
            media: media.clone(),
            listener: Some(listener.clone()),
        };
        let settings = NarrationSettings {
            voice,
            retry: RetryPolicy::none(),
            timings: PlaybackTimings {
                manual_stop_guard: Duration::from_millis(100),
                reconcile_interval: Duration::from_millis(100),
                reconcile_checks: 3,
            },
            ..NarrationSettings::default()
        };

        Narration {
            manager: NarrationManager::new(self.target(story_index), settings, deps),
            speech,
            media,
            listener,
        }
    }
}

pub fn premium_voice() -> VoicePreference {
    VoicePreference::Premium("Joanna".to_string())
}

/// Four paragraphs that each fill most of a synthesis unit
pub fn long_story() -> String {
    let paragraph = "The lantern maker walked the harbour wall every evening. ".repeat(40);
    vec![paragraph.trim().to_string(); 4].join("\n\n")
}

pub async fn wait_until<F>(manager: &NarrationManager, timeout: Duration, condition: F) -> NarrationState
where
    F: Fn(&NarrationState) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let state = manager.get_state();
        if condition(&state) || tokio::time::Instant::now() >= deadline {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
