use super::chunker::{chunk_text, ChunkLimits};
use super::language::{detect_language, LanguageCode};
use super::model::{JobStatus, NarrationTarget, SynthesisJob, UnitStatus};
use super::voice::{default_voice_for_language, VoicePreference};
use crate::domain::audio::{LocalTrackHandle, TrackAssembler, TrackStore};
use crate::domain::persistence::{AudioAssignmentListener, PersistenceCoordinator};
use crate::domain::playback::{
    select_source, NarrationState, PlayOptions, PlaybackBackend, PlaybackEngine, PlaybackTimings, RemoteTrackLoader, SourceContext, StateStore, StateUpdate, Subscription,
};
use crate::domain::synthesis::{RetryPolicy, SynthesisClient, SynthesisError};
use crate::error::{AppError, AppResult};
use crate::infrastructure::playback::{MediaSink, SpeechEngine};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Tunables for one narration item
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationSettings {
    pub chunk_limits: ChunkLimits,
    pub retry: RetryPolicy,
    pub timings: PlaybackTimings,
    pub voice: VoicePreference,
    /// Detected from the text when unset
    pub language: Option<LanguageCode>,
    pub track_cache_enabled: bool,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            chunk_limits: ChunkLimits::default(),
            retry: RetryPolicy::default(),
            timings: PlaybackTimings::default(),
            voice: VoicePreference::Premium(
                default_voice_for_language(LanguageCode::English).to_string(),
            ),
            language: None,
            track_cache_enabled: true,
        }
    }
}

/// Collaborators a manager works with
#[derive(Clone)]
pub struct NarrationDeps {
    pub synthesis: Arc<SynthesisClient>,
    /// Also provides the track store and durable storage
    pub persistence: Arc<PersistenceCoordinator>,
    pub speech: Arc<dyn SpeechEngine>,
    pub media: Arc<dyn MediaSink>,
    pub listener: Option<Arc<dyn AudioAssignmentListener>>,
}

struct ManagerInner {
    target: NarrationTarget,
    chunk_limits: ChunkLimits,
    retry: RetryPolicy,
    configured_language: Option<LanguageCode>,
    synthesis: Arc<SynthesisClient>,
    persistence: Arc<PersistenceCoordinator>,
    listener: Option<Arc<dyn AudioAssignmentListener>>,
    tracks: Arc<TrackStore>,
    engine: PlaybackEngine,
    store: StateStore,
    job: Mutex<SynthesisJob>,
    text: Mutex<String>,
    language: Mutex<LanguageCode>,
    voice: Mutex<VoicePreference>,
    /// Bumped whenever the job is replaced; late results from an older job
    /// are dropped
    job_generation: AtomicU64,
    persistence_task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

/// Audio synthesis and playback for one narration item.
///
/// Cheap to clone; clones share the same job, state and playback session.
#[derive(Clone)]
pub struct NarrationManager {
    inner: Arc<ManagerInner>,
}

impl NarrationManager {
    pub fn new(target: NarrationTarget, settings: NarrationSettings, deps: NarrationDeps) -> Self {
        let uses_on_device_voice = settings.voice.uses_on_device_voice();
        let job = SynthesisJob::new(uses_on_device_voice);
        let store = StateStore::new(NarrationState::default());
        store.stage(
            StateUpdate::new()
                .job_status(job.status)
                .on_device_voice(uses_on_device_voice),
        );

        let tracks = Arc::clone(deps.persistence.tracks());
        let remote = RemoteTrackLoader::new(
            Arc::clone(deps.persistence.storage()),
            settings.track_cache_enabled,
        );
        let engine = PlaybackEngine::new(
            deps.speech,
            deps.media,
            Arc::clone(&tracks),
            remote,
            store.clone(),
            settings.timings,
        );

        Self {
            inner: Arc::new(ManagerInner {
                target,
                chunk_limits: settings.chunk_limits,
                retry: settings.retry,
                configured_language: settings.language,
                synthesis: deps.synthesis,
                persistence: deps.persistence,
                listener: deps.listener,
                tracks,
                engine,
                store,
                job: Mutex::new(job),
                text: Mutex::new(String::new()),
                language: Mutex::new(settings.language.unwrap_or(LanguageCode::English)),
                voice: Mutex::new(settings.voice),
                job_generation: AtomicU64::new(0),
                persistence_task: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Set the text to narrate, discarding any unit state from earlier text.
    ///
    /// Known tracks are kept: they belong to the story, not to the text.
    pub fn initialize(&self, text: impl Into<String>) -> AppResult<NarrationState> {
        self.ensure_alive()?;
        let text = text.into();
        let language = self
            .inner
            .configured_language
            .unwrap_or_else(|| detect_language(&text));

        tracing::info!(
            story_index = self.inner.target.story_index,
            text_length = text.len(),
            language = %language,
            "Narration initialized"
        );

        *lock(&self.inner.text) = text;
        *lock(&self.inner.language) = language;

        let status = {
            let mut job = lock(&self.inner.job);
            if job.status == JobStatus::Creating {
                self.inner.job_generation.fetch_add(1, Ordering::SeqCst);
            }
            job.units.clear();
            job.last_error = None;
            job.status = job.resting_status();
            job.status
        };

        Ok(self.inner.store.update(
            StateUpdate::new()
                .job_status(status)
                .creating(false)
                .progress(0, 0, 0)
                .error(None),
        ))
    }

    /// Synthesize, assemble and register a playable local track.
    ///
    /// Resolves as soon as the local track is playable; the durable upload
    /// continues in the background.
    pub async fn create_audio(&self) -> AppResult<NarrationState> {
        self.ensure_alive()?;
        let inner = &self.inner;

        let voice = lock(&inner.voice).clone();
        let Some(voice_id) = voice.premium_voice_id().map(str::to_string) else {
            tracing::debug!("On-device voice selected, nothing to synthesize");
            return Ok(inner.store.snapshot());
        };

        let text = lock(&inner.text).clone();
        let chunks = chunk_text(&text, inner.chunk_limits);
        if chunks.is_empty() {
            tracing::info!("Narration text is empty, no audio to create");
            return Ok(inner.store.snapshot());
        }

        let (generation, units) = {
            let mut job = lock(&inner.job);
            if job.status == JobStatus::Creating {
                tracing::debug!("Audio creation already in progress");
                return Ok(inner.store.snapshot());
            }
            job.load_chunks(chunks);
            job.units.iter_mut().for_each(|unit| unit.start());
            job.status = JobStatus::Creating;
            job.last_error = None;
            let generation = inner.job_generation.fetch_add(1, Ordering::SeqCst) + 1;
            (generation, job.units.clone())
        };

        let total = units.len();
        inner.store.update(
            StateUpdate::new()
                .job_status(JobStatus::Creating)
                .creating(true)
                .progress(total, 0, 0)
                .error(None)
                .warning(None),
        );

        let language = *lock(&inner.language);
        let start_time = Instant::now();
        tracing::info!(
            story_index = inner.target.story_index,
            unit_count = total,
            voice_id = %voice_id,
            language = %language,
            text_length = text.len(),
            "Creating narration audio"
        );

        let results = join_all(units.iter().map(|unit| {
            let label = format!("unit-{}", unit.index);
            let voice_id = voice_id.as_str();
            async move {
                inner
                    .retry
                    .run(&label, move || {
                        inner
                            .synthesis
                            .synthesize(unit, voice_id, language, &inner.target)
                    })
                    .await
            }
        }))
        .await;

        if self.is_destroyed() {
            tracing::debug!("Manager destroyed during synthesis, discarding results");
            return Err(AppError::Destroyed);
        }

        // Generation is compared under the job lock; every bump happens while holding it
        let applied = {
            let mut job = lock(&inner.job);
            if inner.job_generation.load(Ordering::SeqCst) != generation {
                None
            } else {
                let mut first_error: Option<SynthesisError> = None;
                for (unit, result) in job.units.iter_mut().zip(results) {
                    match result {
                        Ok(audio) => unit.complete(audio),
                        Err(e) => {
                            tracing::warn!(unit_index = unit.index, error = %e, "Narration unit failed");
                            unit.fail(e.to_string());
                            first_error.get_or_insert(e);
                        }
                    }
                }
                let completed = job.completed_units();
                let failed = job
                    .units
                    .iter()
                    .filter(|unit| unit.status == UnitStatus::Error)
                    .count();
                Some((job.units.clone(), first_error, completed, failed))
            }
        };
        let Some((units, first_error, completed, failed)) = applied else {
            tracing::debug!("Job replaced during synthesis, discarding results");
            return Ok(inner.store.snapshot());
        };

        if completed == 0 {
            let error = first_error.unwrap_or(SynthesisError::MissingPayload);
            let message = format!("All {} narration units failed: {}", total, error);
            tracing::error!(unit_count = total, error = %error, "Audio creation failed");
            let error = AppError::Synthesis(error);
            self.fail_job(generation, &error, message, total, completed, failed);
            return Err(error);
        }

        let assembler = TrackAssembler::new(inner.synthesis.sample_rate());
        let tracks = Arc::clone(&inner.tracks);
        let assembled =
            match tokio::task::spawn_blocking(move || assembler.assemble(&units, &tracks)).await {
                Ok(assembled) => assembled,
                Err(e) => {
                    let message = format!("assembly task failed: {}", e);
                    let error = AppError::Internal(message.clone());
                    self.fail_job(generation, &error, message, total, completed, failed);
                    return Err(error);
                }
            };

        let assembled = match assembled {
            Ok(assembled) => assembled,
            Err(e) => {
                tracing::error!(error = %e, "Track assembly failed");
                let message = e.to_string();
                let error = AppError::Assembly(e);
                self.fail_job(generation, &error, message, total, completed, failed);
                return Err(error);
            }
        };

        let registered = {
            let mut job = lock(&inner.job);
            if self.is_destroyed() || inner.job_generation.load(Ordering::SeqCst) != generation {
                None
            } else {
                let previous = job.local_track.replace(assembled.handle);
                job.status = JobStatus::Ready;
                Some(previous)
            }
        };
        let Some(previous) = registered else {
            inner.tracks.revoke(&assembled.handle);
            return if self.is_destroyed() {
                Err(AppError::Destroyed)
            } else {
                Ok(inner.store.snapshot())
            };
        };
        if let Some(previous) = previous {
            inner.tracks.revoke(&previous);
        }

        let warning = (failed > 0).then(|| {
            format!(
                "{} of {} narration parts could not be generated and will be skipped",
                failed, total
            )
        });

        tracing::info!(
            story_index = inner.target.story_index,
            units_included = assembled.units_included,
            units_skipped = assembled.units_skipped,
            duration_secs = assembled.duration.as_secs_f64(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "Narration audio ready"
        );

        let state = inner.store.update(
            StateUpdate::new()
                .job_status(JobStatus::Ready)
                .creating(false)
                .local_track(Some(assembled.handle))
                .progress(total, completed, failed)
                .persisting(true)
                .warning(warning),
        );

        self.spawn_persistence(assembled.handle, generation);
        Ok(state)
    }

    /// Wait for the background upload started by `create_audio`, if any
    pub async fn wait_for_persistence(&self) {
        let task = lock(&self.inner.persistence_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Persistence task did not complete");
            }
        }
    }

    pub async fn play(&self, options: PlayOptions) -> AppResult<()> {
        self.ensure_alive()?;
        let inner = &self.inner;

        let (uses_on_device_voice, local_track, remote_key, job_status) = {
            let job = lock(&inner.job);
            (
                job.uses_on_device_voice,
                job.local_track.filter(|handle| inner.tracks.contains(handle)),
                job.remote_key.clone(),
                job.status,
            )
        };

        let context = SourceContext {
            uses_on_device_voice,
            local_track,
            remote_key: remote_key.as_deref(),
            job_status,
        };

        let source = match select_source(&context, options) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(
                    prefer_durable = options.prefer_durable,
                    job_status = ?job_status,
                    "No playable source"
                );
                inner.engine.stop();
                inner
                    .store
                    .update(StateUpdate::playback_failed(e.to_string()));
                return Err(e.into());
            }
        };

        let text = lock(&inner.text).clone();
        let language = *lock(&inner.language);
        inner
            .engine
            .play(source, &text, language)
            .await
            .map_err(AppError::from)
    }

    pub fn stop(&self) {
        self.inner.engine.stop();
    }

    pub async fn toggle_playback(&self, options: PlayOptions) -> AppResult<()> {
        self.ensure_alive()?;
        if self.inner.store.snapshot().is_playing {
            self.stop();
            Ok(())
        } else {
            self.play(options).await
        }
    }

    /// Forget the synthesized audio so it can be created again.
    ///
    /// A no-op while the on-device voice is selected.
    pub async fn reset_audio_state(&self) -> AppResult<NarrationState> {
        self.ensure_alive()?;
        let inner = &self.inner;

        if lock(&inner.voice).uses_on_device_voice() {
            return Ok(inner.store.snapshot());
        }

        inner.engine.stop();
        let (local_track, remote_key) = {
            let mut job = lock(&inner.job);
            inner.job_generation.fetch_add(1, Ordering::SeqCst);
            let previous = (job.local_track.take(), job.remote_key.take());
            *job = SynthesisJob::new(false);
            previous
        };
        if let Some(handle) = local_track {
            inner.tracks.revoke(&handle);
        }
        // Recreated audio is stored under the same key
        if let Some(key) = remote_key {
            inner.engine.remote().forget(&key).await;
        }

        tracing::info!(story_index = inner.target.story_index, "Audio state reset");

        Ok(inner.store.update(
            StateUpdate::new()
                .job_status(JobStatus::NotCreated)
                .creating(false)
                .local_track(None)
                .remote_key(None)
                .progress(0, 0, 0)
                .persisting(false)
                .error(None)
                .warning(None),
        ))
    }

    /// Record a durable track created elsewhere; an empty key clears it
    pub fn update_remote_key(&self, key: impl Into<String>) -> AppResult<NarrationState> {
        self.ensure_alive()?;
        let key = key.into();
        let key = (!key.trim().is_empty()).then_some(key);

        let status = {
            let mut job = lock(&self.inner.job);
            job.remote_key = key.clone();
            if job.status != JobStatus::Creating {
                job.status = job.resting_status();
                job.last_error = None;
            }
            job.status
        };

        tracing::info!(key = ?key, "Remote key updated");
        Ok(self
            .inner
            .store
            .update(StateUpdate::new().remote_key(key).job_status(status)))
    }

    /// Switch voices. Whatever is playing on the backend the new preference
    /// no longer uses is stopped; known tracks are kept.
    pub fn set_voice_preference(&self, preference: VoicePreference) -> AppResult<NarrationState> {
        self.ensure_alive()?;
        let inner = &self.inner;
        let on_device = preference.uses_on_device_voice();

        let active = inner.engine.active_backend();
        let conflicting = match active {
            Some(PlaybackBackend::OnDeviceVoice) => !on_device,
            Some(PlaybackBackend::LocalTrack | PlaybackBackend::RemoteTrack) => on_device,
            None => false,
        };
        if conflicting {
            inner.engine.stop();
        }

        *lock(&inner.voice) = preference.clone();
        let status = {
            let mut job = lock(&inner.job);
            job.uses_on_device_voice = on_device;
            if job.status != JobStatus::Creating {
                job.status = job.resting_status();
            }
            job.status
        };

        tracing::info!(voice = ?preference, stopped_playback = conflicting, "Voice preference changed");
        Ok(inner.store.update(
            StateUpdate::new()
                .on_device_voice(on_device)
                .job_status(status),
        ))
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NarrationState) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(callback)
    }

    pub fn get_state(&self) -> NarrationState {
        self.inner.store.snapshot()
    }

    /// Tear down playback and silence every observer for good.
    ///
    /// A background upload already in flight still completes.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.engine.shutdown();
        self.inner.store.close();

        let local_track = lock(&self.inner.job).local_track.take();
        if let Some(handle) = local_track {
            self.inner.tracks.revoke(&handle);
        }

        tracing::info!(story_index = self.inner.target.story_index, "Narration manager destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    fn ensure_alive(&self) -> AppResult<()> {
        if self.is_destroyed() {
            Err(AppError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// End a creation attempt. Only fatal errors move the job to `Error`.
    fn fail_job(
        &self,
        generation: u64,
        error: &AppError,
        message: String,
        total: usize,
        completed: usize,
        failed: usize,
    ) {
        let status = {
            let mut job = lock(&self.inner.job);
            if self.inner.job_generation.load(Ordering::SeqCst) != generation {
                tracing::debug!("Job replaced before failure was recorded");
                return;
            }
            job.status = if error.is_fatal() {
                job.last_error = Some(message.clone());
                JobStatus::Error
            } else {
                job.resting_status()
            };
            job.status
        };
        self.inner.store.update(
            report(error, message)
                .job_status(status)
                .creating(false)
                .progress(total, completed, failed),
        );
    }

    fn spawn_persistence(&self, handle: LocalTrackHandle, generation: u64) {
        let inner = Arc::clone(&self.inner);
        // Taken before spawning, destroy() revokes the handle
        let track = self.inner.persistence.checkout(&handle);
        let task = tokio::spawn(async move {
            let result = match track {
                Ok(track) => {
                    inner
                        .persistence
                        .persist(track, &inner.target, inner.listener.as_deref())
                        .await
                }
                Err(e) => Err(e),
            };

            if inner.destroyed.load(Ordering::SeqCst)
                || inner.job_generation.load(Ordering::SeqCst) != generation
            {
                tracing::debug!("Narration changed while persisting, not recording remote key");
                return;
            }

            match result {
                Ok(persisted) => {
                    lock(&inner.job).remote_key = Some(persisted.key.clone());
                    let warning = (!persisted.metadata_updated)
                        .then(|| "Audio saved, but story details could not be updated".to_string());
                    let mut update = StateUpdate::new()
                        .remote_key(Some(persisted.key))
                        .persisting(false);
                    if warning.is_some() {
                        update = update.warning(warning);
                    }
                    inner.store.update(update);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Narration track not persisted, local playback unaffected");
                    let error = AppError::Persistence(e);
                    inner
                        .store
                        .update(report(&error, error.user_message()).persisting(false));
                }
            }
        });

        *lock(&self.inner.persistence_task) = Some(task);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fatal errors surface as the state's error, the rest as a warning
fn report(error: &AppError, message: String) -> StateUpdate {
    if error.is_fatal() {
        StateUpdate::new().error(Some(message))
    } else {
        StateUpdate::new().warning(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::{encode_wav, AudioSamples, PcmDecoder};
    use crate::domain::persistence::{audio_key, VerificationPolicy};
    use crate::domain::synthesis::SynthesisRequest;
    use crate::infrastructure::playback::{HeadlessMediaSink, HeadlessSpeechEngine};
    use crate::infrastructure::repositories::{MemoryObjectStorage, SynthesisRepository};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const SAMPLE_RATE: u32 = 24_000;

    struct FakeRepository {
        failing_chunks: HashSet<usize>,
        latency: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SynthesisRepository for FakeRepository {
        async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            if self.failing_chunks.contains(&request.chunk_index) {
                return Err(SynthesisError::Status {
                    status: 400,
                    message: "rejected".to_string(),
                });
            }
            Ok(encode_wav(&AudioSamples::silence(Duration::from_millis(100), SAMPLE_RATE)).unwrap())
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        assigned: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl AudioAssignmentListener for RecordingListener {
        async fn on_audio_assigned(&self, story_index: usize, filename: &str) {
            self.assigned.lock().unwrap().push((story_index, filename.to_string()));
        }
    }

    struct Fixture {
        manager: NarrationManager,
        repository: Arc<FakeRepository>,
        storage: Arc<MemoryObjectStorage>,
        tracks: Arc<TrackStore>,
        speech: Arc<HeadlessSpeechEngine>,
        media: Arc<HeadlessMediaSink>,
        listener: Arc<RecordingListener>,
    }

    fn fixture(voice: VoicePreference, failing_chunks: &[usize]) -> Fixture {
        let repository = Arc::new(FakeRepository {
            failing_chunks: failing_chunks.iter().copied().collect(),
            latency: Duration::from_millis(50),
            calls: AtomicUsize::new(0),
        });
        let storage = Arc::new(MemoryObjectStorage::new());
        let tracks = Arc::new(TrackStore::new());
        let speech = Arc::new(HeadlessSpeechEngine::new());
        let media = Arc::new(HeadlessMediaSink::new());
        let listener = Arc::new(RecordingListener::default());

        let deps = NarrationDeps {
            synthesis: Arc::new(SynthesisClient::new(
                repository.clone(),
                PcmDecoder::new(SAMPLE_RATE),
            )),
            persistence: Arc::new(PersistenceCoordinator::new(
                storage.clone(),
                tracks.clone(),
                VerificationPolicy::default(),
            )),
            speech: speech.clone(),
            media: media.clone(),
            listener: Some(listener.clone()),
        };
        let settings = NarrationSettings {
            voice,
            retry: RetryPolicy::none(),
            ..NarrationSettings::default()
        };
        let manager = NarrationManager::new(target(), settings, deps);

        Fixture {
            manager,
            repository,
            storage,
            tracks,
            speech,
            media,
            listener,
        }
    }

    fn target() -> NarrationTarget {
        NarrationTarget::new("user-1", "artifact-1", 0)
    }

    fn premium() -> VoicePreference {
        VoicePreference::Premium("Joanna".to_string())
    }

    fn long_story() -> String {
        let paragraph = "The river kept its secrets until the spring floods came. ".repeat(40);
        vec![paragraph.trim().to_string(); 4].join("\n\n")
    }

    fn record(manager: &NarrationManager) -> (Arc<Mutex<Vec<NarrationState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = manager.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
        (seen, subscription)
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_story_is_playable_before_upload_completes() {
        let f = fixture(premium(), &[]);
        f.storage.set_visibility_lag(Duration::from_secs(2));
        f.manager.initialize(long_story()).unwrap();

        let state = f.manager.create_audio().await.unwrap();

        assert_eq!(state.job_status, JobStatus::Ready);
        assert_eq!(state.units_total, 4);
        assert_eq!(state.units_completed, 4);
        assert!(state.local_track.is_some());
        assert!(state.has_audio_file);
        assert!(state.is_persisting);
        assert_eq!(state.remote_key, None);
        assert_eq!(f.repository.calls.load(Ordering::SeqCst), 4);

        f.manager.wait_for_persistence().await;

        let state = f.manager.get_state();
        assert_eq!(state.remote_key, Some(audio_key(&target(), "wav")));
        assert!(!state.is_persisting);
        assert_eq!(state.warning, None);
        assert_eq!(
            *f.listener.assigned.lock().unwrap(),
            vec![(0, "story_audio_1.wav".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unit_is_skipped_with_warning() {
        let f = fixture(premium(), &[1]);
        f.manager.initialize(long_story()).unwrap();

        let state = f.manager.create_audio().await.unwrap();

        assert_eq!(state.job_status, JobStatus::Ready);
        assert_eq!(state.units_completed, 3);
        assert_eq!(state.units_failed, 1);
        assert!(state.warning.is_some());
        assert_eq!(state.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_units_failing_is_an_error() {
        let f = fixture(premium(), &[0, 1, 2, 3]);
        f.manager.initialize(long_story()).unwrap();

        let result = f.manager.create_audio().await;

        assert!(matches!(result, Err(AppError::Synthesis(_))));
        let state = f.manager.get_state();
        assert_eq!(state.job_status, JobStatus::Error);
        assert!(!state.is_creating_audio);
        assert!(!state.has_audio_file);
        assert!(state.error.unwrap().contains("All 4 narration units failed"));
        assert!(f.storage.keys().is_empty());
        assert!(f.tracks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_is_only_a_warning() {
        let f = fixture(premium(), &[]);
        f.storage.fail_next_puts(2);
        f.manager.initialize("Once upon a time.").unwrap();
        f.manager.create_audio().await.unwrap();

        f.manager.wait_for_persistence().await;

        let state = f.manager.get_state();
        assert_eq!(state.job_status, JobStatus::Ready);
        assert_eq!(state.error, None);
        assert_eq!(
            state.warning.as_deref(),
            Some("Audio could not be saved, but it can still be played.")
        );
        assert!(!state.is_persisting);
        assert_eq!(state.remote_key, None);
        assert_ok!(f.manager.play(PlayOptions::default()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_creates_nothing() {
        let f = fixture(premium(), &[]);
        f.manager.initialize("  \n\n  ").unwrap();

        let state = f.manager.create_audio().await.unwrap();

        assert_eq!(state.job_status, JobStatus::NotCreated);
        assert_eq!(f.repository.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_device_voice_needs_no_synthesis() {
        let f = fixture(VoicePreference::System, &[]);
        f.manager.initialize("A short tale.").unwrap();

        let state = f.manager.create_audio().await.unwrap();
        assert_eq!(state.job_status, JobStatus::Ready);
        assert!(state.uses_on_device_voice);
        assert_eq!(f.repository.calls.load(Ordering::SeqCst), 0);

        f.manager.play(PlayOptions::default()).await.unwrap();
        assert_eq!(f.manager.get_state().backend, Some(PlaybackBackend::OnDeviceVoice));
        assert_eq!(f.speech.speaking_text().as_deref(), Some("A short tale."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_create_runs_one_job() {
        let f = fixture(premium(), &[]);
        f.manager.initialize(long_story()).unwrap();

        let (first, second) = tokio::join!(f.manager.create_audio(), f.manager.create_audio());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(f.repository.calls.load(Ordering::SeqCst), 4);
        assert_eq!(f.manager.get_state().job_status, JobStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_during_creation_discards_results() {
        let f = fixture(premium(), &[]);
        f.manager.initialize(long_story()).unwrap();
        let (seen, _subscription) = record(&f.manager);

        let manager = f.manager.clone();
        let creation = tokio::spawn(async move { manager.create_audio().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        f.manager.destroy();
        let notified = seen.lock().unwrap().len();
        let result = creation.await.unwrap();

        assert!(matches!(result, Err(AppError::Destroyed)));
        assert_eq!(seen.lock().unwrap().len(), notified);
        assert!(f.tracks.is_empty());
        assert!(matches!(
            f.manager.play(PlayOptions::default()).await,
            Err(AppError::Destroyed)
        ));
        assert_err!(f.manager.initialize("Too late."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_right_after_creation_still_uploads() {
        let f = fixture(premium(), &[]);
        f.manager.initialize("Once upon a time.").unwrap();
        f.manager.create_audio().await.unwrap();

        f.manager.destroy();
        f.manager.wait_for_persistence().await;

        assert!(f.tracks.is_empty());
        assert!(f.storage.keys().contains(&audio_key(&target(), "wav")));
        assert_eq!(
            *f.listener.assigned.lock().unwrap(),
            vec![(0, "story_audio_1.wav".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_text_during_creation_discards_results() {
        let f = fixture(premium(), &[0, 1, 2, 3]);
        f.manager.initialize(long_story()).unwrap();

        let manager = f.manager.clone();
        let creation = tokio::spawn(async move { manager.create_audio().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        f.manager.initialize("A different tale.").unwrap();
        let result = creation.await.unwrap();

        assert_ok!(result);
        let state = f.manager.get_state();
        assert_eq!(state.job_status, JobStatus::NotCreated);
        assert_eq!(state.error, None);
        assert!(!state.is_creating_audio);
        assert!(f.tracks.is_empty());
        assert!(f.storage.keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_voice_stops_the_track() {
        let f = fixture(premium(), &[]);
        f.manager.initialize("Once upon a time.").unwrap();
        f.manager.create_audio().await.unwrap();

        f.manager.play(PlayOptions::default()).await.unwrap();
        assert_eq!(f.manager.get_state().backend, Some(PlaybackBackend::LocalTrack));
        assert!(f.media.audible().is_some());

        let state = f.manager.set_voice_preference(VoicePreference::System).unwrap();
        assert!(!state.is_playing);
        assert!(state.uses_on_device_voice);
        assert!(state.has_audio_file);
        assert_eq!(f.media.audible(), None);

        f.manager.play(PlayOptions::default()).await.unwrap();
        assert_eq!(f.manager.get_state().backend, Some(PlaybackBackend::OnDeviceVoice));
        assert_eq!(f.media.audible(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefer_durable_plays_the_remote_track() {
        let f = fixture(VoicePreference::System, &[]);
        let key = audio_key(&target(), "wav");
        let wav = encode_wav(&AudioSamples::silence(Duration::from_secs(1), SAMPLE_RATE)).unwrap();
        f.storage.insert(&key, wav, "audio/wav");
        f.manager.initialize("A short tale.").unwrap();
        f.manager.update_remote_key(key).unwrap();

        assert_ok!(f.manager.play(PlayOptions::durable()).await);

        assert_eq!(f.manager.get_state().backend, Some(PlaybackBackend::RemoteTrack));
        assert_eq!(f.speech.speaking_text(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forgets_audio() {
        let f = fixture(premium(), &[]);
        f.manager.initialize("Once upon a time.").unwrap();
        f.manager.create_audio().await.unwrap();
        f.manager.wait_for_persistence().await;

        let state = f.manager.reset_audio_state().await.unwrap();

        assert_eq!(state.job_status, JobStatus::NotCreated);
        assert!(!state.has_audio_file);
        assert_eq!(state.remote_key, None);
        assert!(f.tracks.is_empty());

        let result = f.manager.play(PlayOptions::default()).await;
        assert!(matches!(result, Err(AppError::NoAudioSource)));
        let state = f.manager.get_state();
        assert!(!state.is_playing);
        assert!(state.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_starts_and_stops() {
        let f = fixture(premium(), &[]);
        f.manager.initialize("Once upon a time.").unwrap();
        f.manager.create_audio().await.unwrap();

        assert_ok!(f.manager.toggle_playback(PlayOptions::default()).await);
        assert!(f.manager.get_state().is_playing);

        assert_ok!(f.manager.toggle_playback(PlayOptions::default()).await);
        assert!(!f.manager.get_state().is_playing);
        assert_eq!(f.media.audible(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_remote_key_clears_it() {
        let f = fixture(premium(), &[]);

        let state = f.manager.update_remote_key("public/u/a/story_audio_1.wav").unwrap();
        assert_eq!(state.job_status, JobStatus::Ready);

        let state = f.manager.update_remote_key("").unwrap();
        assert_eq!(state.remote_key, None);
        assert_eq!(state.job_status, JobStatus::NotCreated);
    }
}
