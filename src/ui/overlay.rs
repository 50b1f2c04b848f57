//! Annotation surface management
//!
//! Owns every live overlay: at most one temporary box (auto-dismissed) and
//! any number of persistent boxes keyed by region id. Placement goes through
//! the window geometry provider and the display resolver; drawing goes
//! through the renderer and the platform surface factory.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use crate::app::scheduler::TaskHandle;
use crate::config::BeaconConfig;
use crate::domain::core::{Rect, Size};
use crate::domain::display::{Display, DisplayLayout};
use crate::platform::window::{WindowError, WindowGeometryProvider};
use crate::platform::{
    AppRegistry, DisplayEnumerator, NativeSurface, Platform, SurfaceError, SurfaceFactory, SurfaceRequest,
};
use crate::ui::renderer::{AnnotationRenderer, RendererError};
use crate::ui::style::AnnotationStyle;
use crate::ui::surface::AnnotationSurface;

/// Overlay management errors
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("target application {0} is not in focus")]
    NotFocused(String),

    #[error("annotation {rect:?} does not intersect any display")]
    OffScreen { rect: Rect },

    #[error("Rendering failed: {0}")]
    Rendering(#[from] RendererError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Outcome of preparing a target application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Geometry can be trusted now
    Ready,
    /// Activation was requested; wait this long before placing
    Settling(Duration),
}

/// A resolved annotation rectangle and the display it lives on
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub rect: Rect,
    pub display: Display,
}

/// A rendered annotation and the frame its native surface will cover
pub struct PreparedAnnotation {
    placement: Placement,
    frame: Rect,
    pixmap: tiny_skia::Pixmap,
}

struct TemporarySlot {
    serial: u64,
    surface: AnnotationSurface,
    dismissal: Option<TaskHandle>,
}

impl TemporarySlot {
    fn retire(self) {
        if let Some(handle) = &self.dismissal {
            handle.cancel();
        }
        // surface teardown runs on drop
    }
}

pub struct SurfaceManager {
    factory: Rc<dyn SurfaceFactory>,
    displays: Rc<dyn DisplayEnumerator>,
    apps: Rc<dyn AppRegistry>,
    geometry: WindowGeometryProvider,
    renderer: AnnotationRenderer,
    temporary_style: AnnotationStyle,
    persistent_style: AnnotationStyle,
    dismiss_after: Duration,
    settle_delay: Duration,
    temporary: Option<TemporarySlot>,
    persistent: BTreeMap<String, AnnotationSurface>,
    next_serial: u64,
}

impl SurfaceManager {
    pub fn new(platform: &Platform, config: &BeaconConfig) -> Self {
        Self {
            factory: Rc::clone(&platform.surfaces),
            displays: Rc::clone(&platform.displays),
            apps: Rc::clone(&platform.apps),
            geometry: WindowGeometryProvider::new(Rc::clone(&platform.apps), Rc::clone(&platform.windows)),
            renderer: AnnotationRenderer::new(&config.caption_font_paths, config.caption_font_px),
            temporary_style: config.temporary_style(),
            persistent_style: config.persistent_style(),
            dismiss_after: config.dismiss_after(),
            settle_delay: config.settle_delay(),
            temporary: None,
            persistent: BTreeMap::new(),
            next_serial: 1,
        }
    }

    pub fn dismiss_after(&self) -> Duration {
        self.dismiss_after
    }

    /// Checks the target and optionally brings it forward
    ///
    /// With `activate`, the target is asked to come to the front and the
    /// caller must wait `Settling(delay)` before placing. Otherwise, unless
    /// `bypass_focus_check`, the target must already be frontmost.
    pub fn prepare_target(
        &self,
        app_id: &str,
        activate: bool,
        bypass_focus_check: bool,
    ) -> Result<Readiness, OverlayError> {
        let process = self.geometry.process(app_id)?;
        self.geometry.resolve_window_frame(app_id)?;

        if activate {
            if !self.apps.activate(&process) {
                tracing::warn!(app_id, "activation request was refused");
            }
            return Ok(Readiness::Settling(self.settle_delay));
        }

        if !bypass_focus_check {
            let frontmost = self.apps.frontmost_application();
            if frontmost.as_ref().map(|p| p.pid) != Some(process.pid) {
                tracing::debug!(app_id, frontmost = ?frontmost.map(|p| p.app_id), "target not frontmost");
                return Err(OverlayError::NotFocused(app_id.to_string()));
            }
        }
        Ok(Readiness::Ready)
    }

    /// Box of `size` centred on the target's primary window
    pub fn place_centered(&self, app_id: &str, size: Size) -> Result<Placement, OverlayError> {
        let window = self.geometry.resolve_window_frame(app_id)?;
        self.place_absolute(window.centered_on(size))
    }

    /// Box at `relative` from the target window's top-left corner
    pub fn place_at_offset(&self, app_id: &str, relative: Rect) -> Result<Placement, OverlayError> {
        let window = self.geometry.resolve_window_frame(app_id)?;
        self.place_absolute(window.offset_by(relative))
    }

    /// Resolves the display for a global rect, failing if it is off-screen
    pub fn place_absolute(&self, rect: Rect) -> Result<Placement, OverlayError> {
        let layout = DisplayLayout::new(self.displays.all_displays()).map_err(|e| {
            tracing::warn!(error = %e, "display enumeration returned nothing");
            OverlayError::OffScreen { rect }
        })?;
        let display = layout.resolve(&rect);
        if !rect.intersects(&display.frame) {
            return Err(OverlayError::OffScreen { rect });
        }
        Ok(Placement {
            rect,
            display: display.clone(),
        })
    }

    /// Lays out and rasterises an annotation without touching any surface
    fn prepare(&self, placement: &Placement, style: &AnnotationStyle) -> Result<PreparedAnnotation, OverlayError> {
        let layout = self.renderer.layout(placement.rect, &placement.display, style)?;
        let pixmap = self.renderer.render(&layout, style)?;
        Ok(PreparedAnnotation {
            placement: placement.clone(),
            frame: layout.frame,
            pixmap,
        })
    }

    /// Renders the temporary box; nothing is shown until `show_temporary`
    pub fn prepare_temporary(
        &self,
        placement: &Placement,
        caption: Option<String>,
    ) -> Result<PreparedAnnotation, OverlayError> {
        let style = self.temporary_style.clone().with_caption(caption);
        self.prepare(placement, &style)
    }

    /// Renders a persistent box; nothing is shown until `show_persistent`
    pub fn prepare_persistent(&self, placement: &Placement) -> Result<PreparedAnnotation, OverlayError> {
        self.prepare(placement, &self.persistent_style)
    }

    fn create(&self, prepared: &PreparedAnnotation) -> Result<Box<dyn NativeSurface>, OverlayError> {
        let native = self.factory.create_surface(&SurfaceRequest {
            frame: prepared.frame,
            display: &prepared.placement.display,
            pixels: &prepared.pixmap,
        })?;
        Ok(native)
    }

    /// Shows the temporary box, replacing any existing one
    ///
    /// The previous box's pending dismissal is cancelled and the box torn
    /// down before the new native surface is created. Returns the serial the
    /// dismissal task must carry.
    pub fn show_temporary(&mut self, prepared: PreparedAnnotation) -> Result<u64, OverlayError> {
        if let Some(previous) = self.temporary.take() {
            tracing::debug!(serial = previous.serial, "replacing temporary annotation");
            previous.retire();
        }

        let native = self.create(&prepared)?;
        let Placement { rect, display } = prepared.placement;
        let serial = self.next_serial;
        self.next_serial += 1;
        self.temporary = Some(TemporarySlot {
            serial,
            surface: AnnotationSurface::temporary(rect, native),
            dismissal: None,
        });
        let display_id = &display.id;
        tracing::info!(serial, ?rect, display = display_id, "temporary annotation shown");
        Ok(serial)
    }

    /// Attaches the dismissal task handle to the temporary box `serial`
    ///
    /// If that box is already gone the handle is cancelled immediately.
    pub fn arm_dismissal(&mut self, serial: u64, handle: TaskHandle) {
        match self.temporary.as_mut() {
            Some(slot) if slot.serial == serial => {
                if let Some(old) = slot.dismissal.replace(handle) {
                    old.cancel();
                }
            }
            _ => handle.cancel(),
        }
    }

    /// Timer callback: removes the temporary box if it is still `serial`
    pub fn expire_temporary(&mut self, serial: u64) -> bool {
        match self.temporary.as_ref() {
            Some(slot) if slot.serial == serial => {
                if let Some(slot) = self.temporary.take() {
                    slot.retire();
                }
                tracing::debug!(serial, "temporary annotation dismissed");
                true
            }
            _ => false,
        }
    }

    /// Shows a persistent box under `id`, replacing one with the same id
    pub fn show_persistent(&mut self, id: &str, prepared: PreparedAnnotation) -> Result<(), OverlayError> {
        let native = self.create(&prepared)?;
        let Placement { rect, display } = prepared.placement;
        let surface = AnnotationSurface::persistent(id, rect, native);
        if self.persistent.insert(id.to_string(), surface).is_some() {
            tracing::debug!(id, "replaced persistent annotation");
        }
        let display_id = &display.id;
        tracing::info!(id, ?rect, display = display_id, "persistent annotation shown");
        Ok(())
    }

    /// Destroys one persistent box; unknown ids are ignored
    pub fn cancel(&mut self, id: &str) -> bool {
        self.persistent.remove(id).is_some()
    }

    pub fn cancel_persistent_all(&mut self) {
        if !self.persistent.is_empty() {
            tracing::debug!(count = self.persistent.len(), "clearing persistent annotations");
        }
        self.persistent.clear();
    }

    /// Destroys the temporary box (cancelling its dismissal) and all persistent boxes
    pub fn clear_all(&mut self) {
        if let Some(slot) = self.temporary.take() {
            slot.retire();
        }
        self.cancel_persistent_all();
    }

    pub fn has_temporary(&self) -> bool {
        self.temporary.is_some()
    }

    pub fn temporary_rect(&self) -> Option<Rect> {
        self.temporary.as_ref().map(|slot| slot.surface.rect())
    }

    pub fn persistent_count(&self) -> usize {
        self.persistent.len()
    }

    pub fn persistent_ids(&self) -> impl Iterator<Item = &str> {
        self.persistent.keys().map(String::as_str)
    }
}
