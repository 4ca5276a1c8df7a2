use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::foundation::core::VideoKey;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::overlay::host::VideoElement;

/// Notification pushed by a [`VideoDiscovery`].
#[derive(Clone)]
pub enum VideoEvent {
    /// A video element appeared in the document.
    Added(Arc<dyn VideoElement>),
    /// A video element left the document.
    Removed(VideoKey),
    /// Playback clock of a video advanced (or was seeked).
    TimeUpdate {
        /// Video that fired the signal.
        key: VideoKey,
        /// New playback position in ms.
        time_ms: f64,
    },
    /// A video's rendered box changed.
    Resized(VideoKey),
}

impl std::fmt::Debug for VideoEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added(v) => f.debug_tuple("Added").field(&v.key()).finish(),
            Self::Removed(k) => f.debug_tuple("Removed").field(k).finish(),
            Self::TimeUpdate { key, time_ms } => f
                .debug_struct("TimeUpdate")
                .field("key", key)
                .field("time_ms", time_ms)
                .finish(),
            Self::Resized(k) => f.debug_tuple("Resized").field(k).finish(),
        }
    }
}

/// Watches the document for video elements.
pub trait VideoDiscovery: Send {
    /// Begin watching. Returns the videos present right now; later changes arrive on `events`.
    fn start(&mut self, events: Sender<VideoEvent>) -> Vec<Arc<dyn VideoElement>>;
    /// Stop watching and drop the event sender.
    fn stop(&mut self);
}

/// Picks the video an alert-scoped load should target.
pub trait TargetResolver: Send + Sync {
    /// Key of the canonical video among `videos`, if any.
    fn resolve(&self, videos: &[Arc<dyn VideoElement>]) -> Option<VideoKey>;
}

/// Looks up raw metadata for an alert. May be backed by a cache, a database or the network.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Raw metadata for `alert_id`, or `None` when the alert has none.
    async fn fetch(&self, alert_id: &str) -> OverlayResult<Option<Value>>;
}

/// Discovery fed by hand: tests and the CLI announce videos through a cloned handle.
#[derive(Clone, Default)]
pub struct ChannelDiscovery {
    inner: Arc<Mutex<ChannelState>>,
}

#[derive(Default)]
struct ChannelState {
    videos: Vec<Arc<dyn VideoElement>>,
    sender: Option<Sender<VideoEvent>>,
}

impl std::fmt::Debug for ChannelDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("ChannelDiscovery")
            .field("videos", &st.videos.iter().map(|v| v.key()).collect::<Vec<_>>())
            .field("running", &st.sender.is_some())
            .finish()
    }
}

impl ChannelDiscovery {
    /// Discovery whose initial snapshot is `videos`.
    pub fn new(videos: impl IntoIterator<Item = Arc<dyn VideoElement>>) -> Self {
        let out = Self::default();
        out.lock().videos = videos.into_iter().collect();
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn send(st: &mut ChannelState, event: VideoEvent) {
        if let Some(tx) = &st.sender
            && tx.send(event).is_err()
        {
            st.sender = None;
        }
    }

    /// Announce a new video.
    pub fn add(&self, video: Arc<dyn VideoElement>) {
        let mut st = self.lock();
        st.videos.push(video.clone());
        Self::send(&mut st, VideoEvent::Added(video));
    }

    /// Announce that `key` left the document. Releases the handle this discovery kept.
    pub fn remove(&self, key: VideoKey) {
        let mut st = self.lock();
        st.videos.retain(|v| v.key() != key);
        Self::send(&mut st, VideoEvent::Removed(key));
    }

    /// Forward a time-update signal.
    pub fn time_update(&self, key: VideoKey, time_ms: f64) {
        Self::send(&mut self.lock(), VideoEvent::TimeUpdate { key, time_ms });
    }

    /// Forward a resize signal.
    pub fn resized(&self, key: VideoKey) {
        Self::send(&mut self.lock(), VideoEvent::Resized(key));
    }

    /// Whether a manager is currently listening.
    pub fn is_running(&self) -> bool {
        self.lock().sender.is_some()
    }
}

impl VideoDiscovery for ChannelDiscovery {
    fn start(&mut self, events: Sender<VideoEvent>) -> Vec<Arc<dyn VideoElement>> {
        let mut st = self.lock();
        st.sender = Some(events);
        st.videos.clone()
    }

    fn stop(&mut self) {
        self.lock().sender = None;
    }
}

/// Resolves to the first video offered (the manager offers them in key order).
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstVideo;

impl TargetResolver for FirstVideo {
    fn resolve(&self, videos: &[Arc<dyn VideoElement>]) -> Option<VideoKey> {
        videos.first().map(|v| v.key())
    }
}

/// Resolves to one fixed key when that video is present.
#[derive(Clone, Copy, Debug)]
pub struct PinnedVideo(pub VideoKey);

impl TargetResolver for PinnedVideo {
    fn resolve(&self, videos: &[Arc<dyn VideoElement>]) -> Option<VideoKey> {
        videos.iter().map(|v| v.key()).find(|k| *k == self.0)
    }
}

/// Metadata held in memory, keyed by alert id.
#[derive(Debug, Default)]
pub struct InMemoryMetadata {
    entries: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashMap<String, String>>,
    fetches: Mutex<Vec<String>>,
}

impl InMemoryMetadata {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `metadata` for `alert_id`.
    pub fn with(self, alert_id: impl Into<String>, metadata: Value) -> Self {
        self.insert(alert_id, metadata);
        self
    }

    /// Make fetches of `alert_id` fail with `reason`.
    pub fn failing(self, alert_id: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(alert_id.into(), reason.into());
        self
    }

    /// Store or replace metadata for `alert_id`.
    pub fn insert(&self, alert_id: impl Into<String>, metadata: Value) {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(alert_id.into(), metadata);
    }

    /// Alert ids fetched so far, in call order.
    pub fn fetches(&self) -> Vec<String> {
        self.fetches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl MetadataSource for InMemoryMetadata {
    async fn fetch(&self, alert_id: &str) -> OverlayResult<Option<Value>> {
        self.fetches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(alert_id.to_owned());
        if let Some(reason) = self
            .failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(alert_id)
        {
            return Err(OverlayError::Other(anyhow::anyhow!(
                "metadata lookup for '{alert_id}' failed: {reason}"
            )));
        }
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(alert_id)
            .cloned())
    }
}
