//! AlertLens draws time-synchronized annotation overlays on top of alert videos.
//!
//! Upstream alert metadata is converted into an [`AnnotationManifest`] by the extractor
//! pipeline, installed on the [`OverlayController`] of the target video, and redrawn on every
//! time update by the renderer registered for each annotation's category:
//!
//! - [`convert_to_manifest`] turns raw metadata into a manifest
//! - [`AnnotationManager`] discovers videos and owns one overlay per video
//! - [`RendererRegistry`] maps categories to [`Renderer`]s shared by every overlay
//! - [`CpuCanvas`] rasterizes an overlay offline for inspection and export
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Annotation records and manifests.
pub mod annotation;
/// Metadata-to-manifest conversion.
pub mod convert;
/// Shared primitives: geometry, time, colors, errors.
pub mod foundation;
/// Discovery-driven overlay management.
pub mod manager;
/// Per-video overlays.
pub mod overlay;
/// Drawing surfaces and renderers.
pub mod render;

pub use crate::annotation::model::{Annotation, AnnotationManifest};
pub use crate::convert::pipeline::{ConvertOpts, Extractor, ExtractorRegistry, convert_to_manifest};
pub use crate::foundation::color::Rgba8;
pub use crate::foundation::core::{
    NormBox, NormPoint, Point, Rect, Size, TimeRange, VideoKey, Viewport,
};
pub use crate::foundation::error::{OverlayError, OverlayResult};
pub use crate::manager::collab::{
    ChannelDiscovery, FirstVideo, InMemoryMetadata, MetadataSource, PinnedVideo, TargetResolver,
    VideoDiscovery, VideoEvent,
};
pub use crate::manager::debug::{DebugInfo, OverlayDebug, sample_manifest};
pub use crate::manager::manager::{AnnotationManager, ManagerOpts};
pub use crate::overlay::controller::{OverlayController, OverlayState, RenderReport};
pub use crate::overlay::host::{
    CanvasFactory, OverlayCanvas, RecordingCanvasFactory, StaticVideo, VideoElement,
};
pub use crate::render::builtin::{
    CROSS, CrossRenderer, DETECTION, DetectionRenderer, TEXT, TextRenderer, builtin_registry,
};
pub use crate::render::cpu::{CanvasFrame, CpuCanvas};
pub use crate::render::registry::{
    NoopRenderer, RecordingRenderer, RegistryHandle, RenderCall, Renderer, RendererRegistry,
};
pub use crate::render::style::OverlayStyle;
pub use crate::render::surface::{DrawCmd, DrawSurface, RecordingSurface, TextAlign};
