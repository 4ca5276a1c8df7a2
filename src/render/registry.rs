use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::annotation::model::Annotation;
use crate::foundation::core::Viewport;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::surface::DrawSurface;

/// Category-specific drawing strategy.
///
/// Renderers are shared across every overlay, so they hold no per-video state. A renderer must
/// leave the surface's draw state as it found it and must not assume it is only called for
/// visible annotations.
pub trait Renderer: Send + Sync {
    /// The category this renderer draws.
    fn kind(&self) -> &str;

    /// Whether this renderer claims `annotation`. Dispatch never calls [`Renderer::render`] when
    /// this returns `false`.
    fn can_render(&self, annotation: &Annotation) -> bool {
        annotation.category == self.kind()
    }

    /// Draw `annotation` as of `time_ms` into `surface`.
    fn render(
        &self,
        annotation: &Annotation,
        time_ms: f64,
        viewport: Viewport,
        surface: &mut dyn DrawSurface,
    ) -> OverlayResult<()>;
}

/// Fallback returned for categories with no registered renderer. Draws nothing.
#[derive(Debug, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn kind(&self) -> &str {
        ""
    }

    fn can_render(&self, _annotation: &Annotation) -> bool {
        false
    }

    fn render(
        &self,
        _annotation: &Annotation,
        _time_ms: f64,
        _viewport: Viewport,
        _surface: &mut dyn DrawSurface,
    ) -> OverlayResult<()> {
        Ok(())
    }
}

/// Mapping from category to renderer.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: BTreeMap<String, Arc<dyn Renderer>>,
    fallback: Arc<NoopRenderer>,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("categories", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RendererRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `category` with `renderer`, returning the renderer it replaces.
    ///
    /// Fails when the renderer declares a different category than the one it is registered
    /// under, since dispatch would then never call it.
    pub fn register(
        &mut self,
        category: impl Into<String>,
        renderer: Arc<dyn Renderer>,
    ) -> OverlayResult<Option<Arc<dyn Renderer>>> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(OverlayError::validation("renderer category must be non-empty"));
        }
        if renderer.kind() != category {
            return Err(OverlayError::validation(format!(
                "renderer declares '{}' but was registered for '{category}'",
                renderer.kind()
            )));
        }
        let previous = self.renderers.insert(category.clone(), renderer);
        if previous.is_some() {
            tracing::debug!(%category, "renderer replaced");
        }
        Ok(previous)
    }

    /// Remove the renderer for `category`.
    pub fn unregister(&mut self, category: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.remove(category)
    }

    /// Renderer for `category`, or `None` when nothing is registered.
    pub fn lookup(&self, category: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.get(category).cloned()
    }

    /// Renderer for `category`, falling back to a no-op renderer.
    pub fn get(&self, category: &str) -> Arc<dyn Renderer> {
        match self.lookup(category) {
            Some(r) => r,
            None => self.fallback.clone() as Arc<dyn Renderer>,
        }
    }

    /// Return `true` when `category` has a renderer.
    pub fn contains(&self, category: &str) -> bool {
        self.renderers.contains_key(category)
    }

    /// Registered categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.renderers.keys().cloned().collect()
    }
}

/// Shared, swappable registry reference.
///
/// Readers take an immutable snapshot per render pass; writers build a modified copy and swap it
/// in, so a renderer that is mid-render is never mutated.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<RendererRegistry>>>,
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(RendererRegistry::default())
    }
}

impl RegistryHandle {
    /// Share `registry`.
    pub fn new(registry: RendererRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// The registry as of now.
    pub fn snapshot(&self) -> Arc<RendererRegistry> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Copy-on-write update of the shared registry.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut RendererRegistry) -> OverlayResult<R>,
    ) -> OverlayResult<R> {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        let mut next = (**guard).clone();
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }

    /// Register (or hot-swap) a renderer for every overlay sharing this handle.
    pub fn register(
        &self,
        category: impl Into<String>,
        renderer: Arc<dyn Renderer>,
    ) -> OverlayResult<Option<Arc<dyn Renderer>>> {
        self.update(|reg| reg.register(category, renderer))
    }
}

/// One call observed by [`RecordingRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderCall {
    /// Annotation id.
    pub id: String,
    /// Annotation category.
    pub category: String,
    /// Time passed to `render`.
    pub time_ms: f64,
    /// Viewport passed to `render`.
    pub viewport: Viewport,
}

/// Renderer that records its invocations and optionally fails for chosen ids.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    kind: String,
    fail_ids: Vec<String>,
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    /// Recorder claiming `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Make `render` return an error for annotation `id`.
    pub fn failing_on(mut self, id: impl Into<String>) -> Self {
        self.fail_ids.push(id.into());
        self
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Ids rendered so far, in call order.
    pub fn rendered_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.id).collect()
    }

    /// Forget recorded calls.
    pub fn reset(&self) {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl Renderer for RecordingRenderer {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn render(
        &self,
        annotation: &Annotation,
        time_ms: f64,
        viewport: Viewport,
        _surface: &mut dyn DrawSurface,
    ) -> OverlayResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RenderCall {
                id: annotation.id.clone(),
                category: annotation.category.clone(),
                time_ms,
                viewport,
            });
        if self.fail_ids.iter().any(|id| *id == annotation.id) {
            return Err(OverlayError::render(format!(
                "recording renderer told to fail on '{}'",
                annotation.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/registry.rs"]
mod tests;
