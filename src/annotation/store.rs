//! Local, optimistic copy of the video, segments and speakers.
//!
//! Mutations land in memory first and are then confirmed remotely. The lock is
//! never held across a remote call, so intents may interleave freely; the last
//! write to a field wins.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{sync::RwLock, task::JoinHandle};

use super::demo::demo_segments;
use super::edit::{EditEffect, EditIntent, EditSessions, EditState};
use super::filter::{project, FilterMode};
use super::types::{Segment, SegmentId, Speaker, Video};
use crate::error::{Result, SyncError};
use crate::export::write_export;
use crate::job::{JobController, JobOutcome};
use crate::notify::{Notifier, UiEvent};
use crate::remote::{AnnotationBackend, IdentifyOptions, UploadPayload};

/// What to do with an optimistic edit the server rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    /// Keep the local value; the next refresh brings back the server's.
    #[default]
    AcceptDivergence,
    /// Restore the previous value unless a newer write replaced it meanwhile.
    Rollback,
}

#[derive(Debug, Clone, Copy)]
enum SegmentField {
    Text,
    Speaker,
}

impl SegmentField {
    fn of(self, segment: &mut Segment) -> &mut String {
        match self {
            SegmentField::Text => &mut segment.text,
            SegmentField::Speaker => &mut segment.speaker,
        }
    }
}

#[derive(Default)]
struct AnnotationState {
    video: Option<Video>,
    segments: Vec<Segment>,
    speakers: Vec<Speaker>,
    filter: FilterMode,
    edits: EditSessions,
    /// Segments are the built-in sample set, not server data.
    offline: bool,
}

impl AnnotationState {
    fn segment_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id == id)
    }
}

#[derive(Clone)]
pub struct AnnotationStore {
    backend: Arc<dyn AnnotationBackend>,
    state: Arc<RwLock<AnnotationState>>,
    jobs: JobController,
    notifier: Notifier,
    policy: MutationPolicy,
}

impl AnnotationStore {
    pub fn new(
        backend: Arc<dyn AnnotationBackend>,
        jobs: JobController,
        notifier: Notifier,
        policy: MutationPolicy,
    ) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(AnnotationState::default())),
            jobs,
            notifier,
            policy,
        }
    }

    pub fn jobs(&self) -> &JobController {
        &self.jobs
    }

    fn reject(&self, msg: impl Into<String>) -> SyncError {
        let msg = msg.into();
        debug!("[store] rejected: {}", msg);
        self.notifier.error(msg.clone());
        SyncError::Validation(msg)
    }

    /// Keep listening for a job the deadline abandoned; its success is still applied.
    fn settle_late<T, F, Fut>(
        &self,
        job: &str,
        handle: JoinHandle<Result<T>>,
        on_success: F,
    ) -> SyncError
    where
        T: Send + 'static,
        F: FnOnce(AnnotationStore, T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let store = self.clone();
        let name = job.to_string();
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(value)) => {
                    info!("[store] '{}' completed after its deadline, applying result", name);
                    on_success(store, value).await;
                }
                Ok(Err(e)) => warn!("[store] '{}' failed after its deadline: {}", name, e),
                Err(e) => warn!("[store] '{}' task ended abnormally: {}", name, e),
            }
        });
        SyncError::TimedOut {
            job: job.to_string(),
            secs: self.jobs.timeout().as_secs(),
        }
    }

    pub async fn video(&self) -> Option<Video> {
        self.state.read().await.video.clone()
    }

    pub async fn segments(&self) -> Vec<Segment> {
        self.state.read().await.segments.clone()
    }

    pub async fn segment(&self, id: SegmentId) -> Option<Segment> {
        self.state
            .read()
            .await
            .segments
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub async fn speakers(&self) -> Vec<Speaker> {
        self.state.read().await.speakers.clone()
    }

    pub async fn filter(&self) -> FilterMode {
        self.state.read().await.filter
    }

    /// Segments under the current filter.
    pub async fn visible_segments(&self) -> Vec<Segment> {
        let state = self.state.read().await;
        project(&state.segments, state.filter)
    }

    pub async fn is_offline(&self) -> bool {
        self.state.read().await.offline
    }

    /// Start time to hand to the player when a segment is clicked.
    pub async fn seek_target(&self, id: SegmentId) -> Option<f64> {
        self.segment(id).await.map(|s| s.start)
    }

    /// Labels present on segments that are not in the local speaker list,
    /// typically assigned by speaker identification.
    pub async fn remote_only_speakers(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .segments
            .iter()
            .filter(|s| s.is_labeled())
            .filter(|s| !state.speakers.iter().any(|sp| sp.name == s.speaker))
            .map(|s| s.speaker.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub async fn load_video(&self, path: &str) -> Result<Video> {
        let path = path.trim();
        if path.is_empty() {
            return Err(self.reject("Please enter a video file path"));
        }
        info!("[store] loading video {}", path);

        let backend = self.backend.clone();
        let requested = path.to_string();
        let outcome = self
            .jobs
            .run("Loading video...", &format!("Opening {}", path), async move {
                backend.load_video(&requested).await
            })
            .await;

        match outcome {
            JobOutcome::Finished(Ok(video)) => {
                self.install_video(video.clone()).await;
                self.notifier.success("Video loaded successfully!");
                Ok(video)
            }
            JobOutcome::Finished(Err(e)) => {
                warn!("[store] load_video failed: {}", e);
                self.notifier.error(format!("Error loading video: {}", e));
                Err(e)
            }
            JobOutcome::TimedOut(handle) => {
                Err(self.settle_late("Loading video", handle, |store, video| async move {
                    store.install_video(video).await;
                }))
            }
        }
    }

    async fn install_video(&self, video: Video) {
        {
            let mut state = self.state.write().await;
            state.video = Some(video.clone());
            state.segments.clear();
            state.edits.clear();
            state.offline = false;
        }
        info!("[store] video ready: {} ({})", video.filename, video.url);
        self.notifier.emit(UiEvent::VideoLoaded {
            url: video.url,
            filename: video.filename,
        });
        self.notifier.emit(UiEvent::SegmentsChanged);
    }

    async fn require_video(&self, msg: &str) -> Result<()> {
        if self.state.read().await.video.is_none() {
            return Err(self.reject(msg));
        }
        Ok(())
    }

    /// Run transcription, then reload segments. Returns the new segment count.
    pub async fn transcribe(&self) -> Result<usize> {
        self.require_video("Please load a video first").await?;

        let backend = self.backend.clone();
        let outcome = self
            .jobs
            .run(
                "Transcribing video with Whisper...",
                "This may take several minutes depending on video length.",
                async move { backend.transcribe().await },
            )
            .await;

        match outcome {
            JobOutcome::Finished(Ok(reported)) => {
                self.notifier.success("Transcription completed successfully!");
                let count = self.refresh_segments().await?;
                if count != reported {
                    debug!(
                        "[store] transcription reported {} segments, server lists {}",
                        reported, count
                    );
                }
                Ok(count)
            }
            JobOutcome::Finished(Err(e)) => {
                warn!("[store] transcription failed: {}", e);
                self.notifier.error(format!("Transcription failed: {}", e));
                Err(e)
            }
            JobOutcome::TimedOut(handle) => {
                Err(self.settle_late("Transcription", handle, |store, _| async move {
                    let _ = store.refresh_segments().await;
                }))
            }
        }
    }

    /// Run speaker identification, then reload segments to pick up its labels.
    ///
    /// Labels it assigns are not added to the local speaker list; see
    /// [`AnnotationStore::remote_only_speakers`].
    pub async fn identify_speakers(&self, options: IdentifyOptions) -> Result<usize> {
        if let Err(msg) = options.validate() {
            return Err(self.reject(msg));
        }
        self.require_video("Please load a video and transcribe first")
            .await?;
        if self.state.read().await.segments.is_empty() {
            debug!("[store] identifying speakers with no local segments");
        }

        let backend = self.backend.clone();
        let outcome = self
            .jobs
            .run(
                "Running speaker identification...",
                "This process will analyze audio patterns to identify speakers.",
                async move { backend.identify_speakers(options).await },
            )
            .await;

        match outcome {
            JobOutcome::Finished(Ok(_)) => {
                self.notifier.success("Speaker identification completed!");
                let count = self.refresh_segments().await?;
                let unlisted = self.remote_only_speakers().await;
                if !unlisted.is_empty() {
                    info!("[store] identification assigned unlisted speakers: {:?}", unlisted);
                }
                Ok(count)
            }
            JobOutcome::Finished(Err(e)) => {
                warn!("[store] speaker identification failed: {}", e);
                self.notifier
                    .error(format!("Speaker identification failed: {}", e));
                Err(e)
            }
            JobOutcome::TimedOut(handle) => {
                Err(self.settle_late("Speaker identification", handle, |store, _| async move {
                    let _ = store.refresh_segments().await;
                }))
            }
        }
    }

    /// Upload an externally produced segments file, then reload segments.
    pub async fn upload_segments_file(&self, payload: UploadPayload) -> Result<usize> {
        if !payload.is_json() {
            return Err(self.reject("Please select a JSON file"));
        }
        if payload.bytes.is_empty() {
            return Err(self.reject(format!("{} is empty", payload.file_name)));
        }
        info!(
            "[store] uploading {} ({} bytes)",
            payload.file_name,
            payload.bytes.len()
        );

        let backend = self.backend.clone();
        let outcome = self
            .jobs
            .run(
                "Uploading segments file...",
                "Processing and validating the uploaded segments.",
                async move { backend.upload_segments_file(payload).await },
            )
            .await;

        match outcome {
            JobOutcome::Finished(Ok(count)) => {
                self.notifier
                    .success(format!("Successfully uploaded {} segments!", count));
                self.refresh_segments().await?;
                Ok(count)
            }
            JobOutcome::Finished(Err(e)) => {
                warn!("[store] upload failed: {}", e);
                self.notifier.error(format!("Upload failed: {}", e));
                Err(e)
            }
            JobOutcome::TimedOut(handle) => {
                Err(self.settle_late("Upload", handle, |store, _| async move {
                    let _ = store.refresh_segments().await;
                }))
            }
        }
    }

    /// Replace the segment collection with the server's.
    ///
    /// If no readable response comes back, the built-in sample segments are
    /// shown instead so the session stays usable; the error is still returned.
    pub async fn refresh_segments(&self) -> Result<usize> {
        match self.backend.fetch_segments().await {
            Ok(segments) => {
                let count = segments.len();
                self.replace_segments(segments, false).await;
                debug!("[store] loaded {} segments", count);
                Ok(count)
            }
            Err(e) if e.is_network_layer() => {
                warn!("[store] fetch_segments failed ({}), using sample segments", e);
                self.notifier.error(format!("Error loading segments: {}", e));
                self.replace_segments(demo_segments(), true).await;
                self.notifier.info("Showing built-in sample segments");
                Err(e)
            }
            Err(e) => {
                warn!("[store] fetch_segments failed: {}", e);
                self.notifier.error(format!("Error loading segments: {}", e));
                Err(e)
            }
        }
    }

    /// Drop local divergence by reloading everything from the server.
    pub async fn resync(&self) -> Result<usize> {
        info!("[store] resync requested");
        self.refresh_segments().await
    }

    async fn replace_segments(&self, segments: Vec<Segment>, offline: bool) {
        {
            let mut state = self.state.write().await;
            state.segments = segments;
            let ids: Vec<SegmentId> = state.segments.iter().map(|s| s.id).collect();
            state.edits.retain_ids(|id| ids.contains(&id));
            state.offline = offline;
        }
        self.notifier.emit(UiEvent::SegmentsChanged);
    }

    pub async fn add_speaker(&self, name: &str) -> Result<Speaker> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject("Please enter a speaker name"));
        }
        let speaker = {
            let mut state = self.state.write().await;
            if state.speakers.iter().any(|s| s.name == name) {
                drop(state);
                return Err(self.reject("Speaker already exists"));
            }
            let speaker = Speaker::custom(name);
            state.speakers.push(speaker.clone());
            speaker
        };
        self.notifier.emit(UiEvent::SpeakersChanged);
        self.notifier
            .success(format!("Speaker \"{}\" added successfully", name));
        Ok(speaker)
    }

    /// Remove a speaker from the list. Segments keep their copy of the label.
    pub async fn remove_speaker(&self, name: &str) -> bool {
        let removed = {
            let mut state = self.state.write().await;
            let before = state.speakers.len();
            state.speakers.retain(|s| s.name != name);
            state.speakers.len() != before
        };
        if removed {
            self.notifier.emit(UiEvent::SpeakersChanged);
            self.notifier.success(format!("Speaker \"{}\" removed", name));
        }
        removed
    }

    pub async fn set_filter(&self, mode: FilterMode) {
        self.state.write().await.filter = mode;
        self.notifier.emit(UiEvent::SegmentsChanged);
    }

    /// Write `value` into a segment field, returning the previous value.
    async fn write_field(&self, id: SegmentId, field: SegmentField, value: &str) -> Option<String> {
        let previous = {
            let mut state = self.state.write().await;
            let segment = state.segment_mut(id)?;
            std::mem::replace(field.of(segment), value.to_string())
        };
        self.notifier.emit(UiEvent::SegmentsChanged);
        Some(previous)
    }

    /// Undo a rejected write if the policy asks for it and nothing newer landed.
    async fn on_rejected(&self, id: SegmentId, field: SegmentField, written: &str, previous: String) {
        if self.policy != MutationPolicy::Rollback {
            debug!("[store] keeping unconfirmed {:?} on segment {}", field, id);
            return;
        }
        let reverted = {
            let mut state = self.state.write().await;
            match state.segment_mut(id).map(|segment| field.of(segment)) {
                Some(slot) if slot.as_str() == written => {
                    *slot = previous;
                    true
                }
                _ => false,
            }
        };
        if reverted {
            info!("[store] rolled back {:?} on segment {}", field, id);
            self.notifier.emit(UiEvent::SegmentsChanged);
        }
    }

    /// Label a segment locally, then confirm with the server.
    pub async fn assign_speaker(&self, id: SegmentId, speaker: &str) -> Result<()> {
        let speaker = speaker.trim();
        if speaker.is_empty() {
            return Err(self.reject("Please choose a speaker"));
        }
        let Some(previous) = self.write_field(id, SegmentField::Speaker, speaker).await else {
            return Err(self.reject(format!("Segment {} not found", id)));
        };

        match self.backend.update_segment_speaker(id, speaker).await {
            Ok(()) => {
                self.notifier
                    .success(format!("Speaker \"{}\" assigned to segment", speaker));
                Ok(())
            }
            Err(e) => {
                warn!("[store] update_segment_speaker({}) failed: {}", id, e);
                self.on_rejected(id, SegmentField::Speaker, speaker, previous)
                    .await;
                self.notifier
                    .error(format!("Error updating speaker: {}", e));
                Err(e)
            }
        }
    }

    pub async fn edit_state(&self, id: SegmentId) -> EditState {
        self.state.read().await.edits.state(id)
    }

    pub async fn editing_ids(&self) -> Vec<SegmentId> {
        self.state.read().await.edits.editing_ids()
    }

    pub async fn start_edit(&self, id: SegmentId) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(current_text) = state.segment_mut(id).map(|s| s.text.clone()) else {
            drop(state);
            return Err(self.reject(format!("Segment {} not found", id)));
        };
        state.edits.apply(id, EditIntent::Start { current_text });
        Ok(())
    }

    /// Replace the draft of a segment in edit mode. Returns false if it is not being edited.
    pub async fn update_draft(&self, id: SegmentId, draft: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.edits.is_editing(id) {
            return false;
        }
        state.edits.apply(id, EditIntent::Change(draft.to_string()));
        true
    }

    /// Leave edit mode and commit the draft. Returns false if the segment was not being edited.
    pub async fn save_edit(&self, id: SegmentId) -> Result<bool> {
        let effect = self.state.write().await.edits.apply(id, EditIntent::Save);
        let EditEffect::Commit { text } = effect else {
            return Ok(false);
        };
        let Some(previous) = self.write_field(id, SegmentField::Text, &text).await else {
            return Err(self.reject(format!("Segment {} not found", id)));
        };

        match self.backend.update_segment_text(id, &text).await {
            Ok(()) => {
                self.notifier
                    .success(format!("Segment {} text updated successfully", id));
                Ok(true)
            }
            Err(e) => {
                warn!("[store] update_segment_text({}) failed: {}", id, e);
                self.on_rejected(id, SegmentField::Text, &text, previous)
                    .await;
                self.notifier.error(format!("Error updating text: {}", e));
                Err(e)
            }
        }
    }

    /// Download the server's label export into `dir`.
    pub async fn export_labels(&self, dir: &Path) -> Result<PathBuf> {
        if self.state.read().await.segments.is_empty() {
            return Err(self.reject("No segments to export"));
        }
        let document = match self.backend.fetch_export().await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("[store] fetch_export failed: {}", e);
                self.notifier
                    .error(format!("Error exporting labels: {}", e));
                return Err(e);
            }
        };
        match write_export(dir, &document) {
            Ok(path) => {
                info!("[store] labels exported to {}", path.display());
                self.notifier.success("Labels exported successfully");
                Ok(path)
            }
            Err(e) => {
                self.notifier
                    .error(format!("Error exporting labels: {}", e));
                Err(e)
            }
        }
    }
}
