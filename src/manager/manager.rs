use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Weak};

use crate::annotation::model::AnnotationManifest;
use crate::convert::pipeline::{ConvertOpts, ExtractorRegistry};
use crate::foundation::core::VideoKey;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::manager::collab::{MetadataSource, TargetResolver, VideoDiscovery, VideoEvent};
use crate::overlay::controller::OverlayController;
use crate::overlay::host::{CanvasFactory, VideoElement};
use crate::render::builtin::{CROSS, DETECTION, TEXT, builtin_registry};
use crate::render::registry::{RegistryHandle, Renderer};
use crate::render::style::OverlayStyle;

/// Manager-wide options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerOpts {
    /// Categories extracted when an alert load names none.
    pub default_categories: Vec<String>,
    /// Whether overlays created from now on show the debug border.
    pub debug_borders: bool,
    /// Options for the extractor pipeline.
    pub convert: ConvertOpts,
}

impl Default for ManagerOpts {
    fn default() -> Self {
        Self {
            default_categories: [DETECTION, TEXT, CROSS].map(str::to_owned).to_vec(),
            debug_borders: false,
            convert: ConvertOpts::default(),
        }
    }
}

/// Owns one [`OverlayController`] per discovered video and orchestrates alert loads.
///
/// Discovery events are queued on a channel and applied by [`AnnotationManager::pump`], so the
/// manager is driven from the host's event loop and never mutated from elsewhere.
pub struct AnnotationManager {
    opts: ManagerOpts,
    registry: RegistryHandle,
    extractors: ExtractorRegistry,
    factory: Box<dyn CanvasFactory>,
    discovery: Option<Box<dyn VideoDiscovery>>,
    resolver: Box<dyn TargetResolver>,
    metadata: Arc<dyn MetadataSource>,
    events: Option<Receiver<VideoEvent>>,
    videos: BTreeMap<VideoKey, Weak<dyn VideoElement>>,
    controllers: BTreeMap<VideoKey, OverlayController>,
    disabled: BTreeSet<String>,
    destroyed: bool,
}

impl std::fmt::Debug for AnnotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationManager")
            .field("opts", &self.opts)
            .field("videos", &self.videos.keys().collect::<Vec<_>>())
            .field("running", &self.events.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl AnnotationManager {
    /// Manager over the given collaborators with the built-in renderers and extractors.
    /// Call [`AnnotationManager::start`] to begin discovery.
    pub fn new(
        factory: impl CanvasFactory + 'static,
        discovery: impl VideoDiscovery + 'static,
        resolver: impl TargetResolver + 'static,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            opts: ManagerOpts::default(),
            registry: RegistryHandle::new(builtin_registry(&OverlayStyle::default())),
            extractors: ExtractorRegistry::with_builtins(),
            factory: Box::new(factory),
            discovery: Some(Box::new(discovery)),
            resolver: Box::new(resolver),
            metadata,
            events: None,
            videos: BTreeMap::new(),
            controllers: BTreeMap::new(),
            disabled: BTreeSet::new(),
            destroyed: false,
        }
    }

    /// Replace the options.
    pub fn with_opts(mut self, opts: ManagerOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Share `registry` instead of the built-in one.
    pub fn with_registry(mut self, registry: RegistryHandle) -> Self {
        self.registry = registry;
        self
    }

    /// Use `extractors` instead of the built-in ones.
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Current options.
    pub fn opts(&self) -> &ManagerOpts {
        &self.opts
    }

    /// Renderer registry shared by every overlay.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Whether [`AnnotationManager::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Start discovery and attach overlays to every video already present. Idempotent.
    pub fn start(&mut self) {
        if self.destroyed || self.events.is_some() {
            return;
        }
        let Some(discovery) = self.discovery.as_mut() else {
            return;
        };
        let (tx, rx) = mpsc::channel();
        let snapshot = discovery.start(tx);
        self.events = Some(rx);
        tracing::debug!(videos = snapshot.len(), "discovery started");
        for video in snapshot {
            self.attach(&video);
        }
    }

    /// Apply queued discovery events. Returns the number handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(rx) = self.events.as_ref() else {
                return handled;
            };
            let event = match rx.try_recv() {
                Ok(ev) => ev,
                Err(TryRecvError::Empty) => return handled,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("discovery channel closed");
                    self.events = None;
                    return handled;
                }
            };
            handled += 1;
            self.handle(event);
        }
    }

    fn handle(&mut self, event: VideoEvent) {
        match event {
            VideoEvent::Added(video) => {
                self.attach(&video);
            }
            VideoEvent::Removed(key) => self.detach(key),
            VideoEvent::TimeUpdate { key, time_ms } => {
                if let Some(ctl) = self.controllers.get_mut(&key) {
                    ctl.on_time_update(time_ms);
                }
            }
            VideoEvent::Resized(key) => {
                if let Some(ctl) = self.controllers.get_mut(&key) {
                    ctl.render_current();
                }
            }
        }
    }

    fn attach(&mut self, video: &Arc<dyn VideoElement>) -> Option<&mut OverlayController> {
        if self.destroyed {
            return None;
        }
        let key = video.key();
        let stale = self
            .controllers
            .get(&key)
            .is_some_and(|ctl| !ctl.video_alive());
        if stale {
            self.detach(key);
        }
        if !self.controllers.contains_key(&key) {
            let canvas = match self.factory.create(video.as_ref()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(video = %key, error = %e, "canvas creation failed");
                    return None;
                }
            };
            let mut ctl = OverlayController::new(video, canvas, self.registry.clone());
            ctl.set_debug_border(self.opts.debug_borders);
            for category in &self.disabled {
                ctl.toggle_renderer(category, false);
            }
            tracing::debug!(video = %key, "overlay attached");
            self.videos.insert(key, Arc::downgrade(video));
            self.controllers.insert(key, ctl);
        }
        self.controllers.get_mut(&key)
    }

    fn detach(&mut self, key: VideoKey) {
        self.videos.remove(&key);
        if let Some(mut ctl) = self.controllers.remove(&key) {
            ctl.destroy();
            tracing::debug!(video = %key, "overlay detached");
        }
    }

    /// The overlay for `video`, created on first use. Re-offering a known video returns the
    /// existing overlay.
    pub fn controller_for(
        &mut self,
        video: &Arc<dyn VideoElement>,
    ) -> Option<&mut OverlayController> {
        self.attach(video)
    }

    /// Overlay for `key`, if one exists.
    pub fn controller(&self, key: VideoKey) -> Option<&OverlayController> {
        self.controllers.get(&key)
    }

    /// Mutable overlay for `key`, if one exists.
    pub fn controller_mut(&mut self, key: VideoKey) -> Option<&mut OverlayController> {
        self.controllers.get_mut(&key)
    }

    /// Keys of every tracked video, sorted.
    pub fn video_keys(&self) -> Vec<VideoKey> {
        self.controllers.keys().copied().collect()
    }

    /// Number of live overlays.
    pub fn overlay_count(&self) -> usize {
        self.controllers.len()
    }

    /// Tear down overlays whose video has been dropped. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let dead: Vec<VideoKey> = self
            .controllers
            .iter()
            .filter(|(_, ctl)| !ctl.video_alive())
            .map(|(k, _)| *k)
            .collect();
        for key in &dead {
            self.detach(*key);
        }
        dead.len()
    }

    /// Timer-driven pass: apply queued events, prune, then re-render every overlay at its video's
    /// clock (which also picks up layout changes).
    pub fn tick(&mut self) {
        self.pump();
        self.prune();
        for ctl in self.controllers.values_mut() {
            ctl.render_current();
        }
    }

    fn live_videos(&self) -> Vec<Arc<dyn VideoElement>> {
        self.videos.values().filter_map(Weak::upgrade).collect()
    }

    /// Ask the resolver which video alert loads should target.
    pub fn resolve_target(&mut self) -> Option<VideoKey> {
        self.prune();
        self.resolver.resolve(&self.live_videos())
    }

    /// Fetch metadata for `alert_id` and convert it, without touching any overlay.
    ///
    /// Empty `categories` means [`ManagerOpts::default_categories`]. Callers that start several
    /// loads concurrently can discard stale results before handing the winner to
    /// [`AnnotationManager::load_manifest_into`].
    #[tracing::instrument(level = "debug", skip(self, categories))]
    pub async fn prepare_alert<S: AsRef<str> + std::fmt::Debug>(
        &self,
        alert_id: &str,
        categories: &[S],
    ) -> OverlayResult<AnnotationManifest> {
        let raw = self
            .metadata
            .fetch(alert_id)
            .await?
            .ok_or_else(|| OverlayError::missing_data(format!("no metadata for alert '{alert_id}'")))?;

        let manifest = if categories.is_empty() {
            self.extractors
                .convert(&raw, &self.opts.default_categories, &self.opts.convert)
        } else {
            self.extractors.convert(&raw, categories, &self.opts.convert)
        };
        let manifest = manifest.ok_or_else(|| {
            OverlayError::missing_data(format!("alert '{alert_id}' has nothing to show"))
        })?;
        if !manifest.validate() {
            return Err(OverlayError::validation(format!(
                "manifest for alert '{alert_id}' failed validation"
            )));
        }
        Ok(manifest)
    }

    /// Install `manifest` on the overlay for `key` and show it. Returns `false` when the video is
    /// unknown or gone.
    pub fn load_manifest_into(&mut self, key: VideoKey, manifest: AnnotationManifest) -> bool {
        let Some(video) = self.videos.get(&key).and_then(Weak::upgrade) else {
            tracing::warn!(video = %key, "no such video; manifest discarded");
            return false;
        };
        let Some(ctl) = self.attach(&video) else {
            return false;
        };
        ctl.load_manifest(manifest);
        ctl.show();
        true
    }

    /// Fetch, convert and install the annotations for `alert_id` on the target video.
    ///
    /// Never fails loudly: every failure is logged and reported as `false`.
    #[tracing::instrument(level = "debug", skip(self, categories))]
    pub async fn load_annotations_for_alert<S: AsRef<str> + std::fmt::Debug>(
        &mut self,
        alert_id: &str,
        categories: &[S],
    ) -> bool {
        if self.destroyed {
            tracing::warn!("manager destroyed; load ignored");
            return false;
        }
        self.pump();
        let manifest = match self.prepare_alert(alert_id, categories).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%alert_id, error = %e, "alert load failed");
                return false;
            }
        };
        let Some(key) = self.resolve_target() else {
            tracing::warn!(%alert_id, "no target video for alert");
            return false;
        };
        tracing::debug!(%alert_id, video = %key, count = manifest.count(), "installing alert annotations");
        self.load_manifest_into(key, manifest)
    }

    /// Show every overlay.
    pub fn show_all(&mut self) {
        self.controllers.values_mut().for_each(OverlayController::show);
    }

    /// Hide every overlay.
    pub fn hide_all(&mut self) {
        self.controllers.values_mut().for_each(OverlayController::hide);
    }

    /// Drop every overlay's manifest.
    pub fn clear_all(&mut self) {
        self.controllers
            .values_mut()
            .for_each(OverlayController::clear_annotations);
    }

    /// Toggle the debug border on every overlay, including ones created later.
    pub fn set_debug_borders(&mut self, on: bool) {
        self.opts.debug_borders = on;
        for ctl in self.controllers.values_mut() {
            ctl.set_debug_border(on);
        }
    }

    /// Include or exclude `category` on every overlay, including ones created later.
    pub fn toggle_renderer(&mut self, category: &str, enabled: bool) {
        if enabled {
            self.disabled.remove(category);
        } else {
            self.disabled.insert(category.to_owned());
        }
        for ctl in self.controllers.values_mut() {
            ctl.toggle_renderer(category, enabled);
        }
    }

    /// Register or hot-swap a renderer under its own category, then redraw.
    pub fn register_renderer(&mut self, renderer: Arc<dyn Renderer>) -> OverlayResult<()> {
        let kind = renderer.kind().to_owned();
        self.registry.register(kind, renderer)?;
        for ctl in self.controllers.values_mut() {
            ctl.render_current();
        }
        Ok(())
    }

    /// Destroy every overlay and stop discovery. Terminal and idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        for (_, mut ctl) in std::mem::take(&mut self.controllers) {
            ctl.destroy();
        }
        self.videos.clear();
        if let Some(mut discovery) = self.discovery.take() {
            discovery.stop();
        }
        self.events = None;
        tracing::debug!("annotation manager destroyed");
    }

    pub(crate) fn controllers(&self) -> impl Iterator<Item = &OverlayController> {
        self.controllers.values()
    }

    pub(crate) fn disabled_categories(&self) -> impl Iterator<Item = &str> {
        self.disabled.iter().map(String::as_str)
    }
}

impl Drop for AnnotationManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manager/manager.rs"]
mod tests;
