//! Pan/zoom/rotate state machine.
//!
//! [`TransformEngine`] owns the affine transform from content space to view
//! space and every gesture that changes it. The transform is composed of
//! two parts:
//!
//! ```text
//! draw = support * base
//!
//! base     quarter-turn rotation + initial layout (scale mode / read mode),
//!          recomputed by reset() whenever content, viewport, mode or
//!          rotation change
//! support  user pan and zoom, identity after reset()
//! ```
//!
//! After every mutation the draw rectangle is clamped against the viewport
//! (small axes are anchored, large axes may not expose background) and the
//! per-axis [`Edge`] classification is updated.
//!
//! The engine is single-writer: it is `!Send` and `!Sync`, so all mutation
//! and listener dispatch happen on the context that created it.

use std::marker::PhantomData;
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::{Affine2, Vec2};
use tilezoom_core::{Rect, RectF, Rotation, Size};
use tracing::{debug, trace};

use crate::animation::{Animation, Fling, Tween};
use crate::config::{ScaleMode, ZoomConfig};
use crate::listener::{ListenerId, Listeners};
use crate::matrix::{map_rect, post_scale, post_translate, rect_to_rect, rotation_affine, scale_of};
use crate::planner::{content_rect_to_image, image_rect_to_view, visible_content_rect};
use crate::scales::{ScaleBounds, round2};

/// Where scrolled content sits relative to the viewport on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    /// Content extends past both viewport edges.
    #[default]
    None,
    /// Content touches the start (left/top) edge.
    Start,
    /// Content touches the end (right/bottom) edge.
    End,
    /// Content fits entirely on this axis.
    Both,
}

/// What the engine is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    /// At rest.
    Idle,
    /// Following a one-pointer drag.
    Dragging,
    /// Pinching, or running an animated zoom.
    Scaling,
    /// Coasting after a drag.
    Flinging,
    /// Animating toward a located point.
    Locating,
}

/// Drag notifications for hosts (scroll bars, parent containers).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEvent {
    /// Content dragged by a view-space delta.
    Drag(Vec2),
    /// A fling started.
    Fling {
        /// Pointer velocity in px/s.
        velocity: Vec2,
    },
}

/// Snapshot of the transform for consumers such as the tile manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Overall draw scale (view pixels per content pixel).
    pub scale: f32,
    /// Translation part of the draw matrix.
    pub translation: Vec2,
    /// User rotation.
    pub rotation: Rotation,
    /// Content size in rotated space (width/height swap at 90 and 270).
    pub content_size: Size,
    /// Full-resolution image size, unrotated.
    pub image_size: Size,
    /// Viewport size.
    pub viewport_size: Size,
    /// Unrotated content space to view space.
    pub draw_matrix: Affine2,
    /// Visible part of the content, unrotated content space.
    pub visible_rect: Rect,
}

impl ViewportState {
    /// Content size before rotation.
    pub fn unrotated_content_size(&self) -> Size {
        if self.rotation.swaps_dimensions() {
            self.content_size.swapped()
        } else {
            self.content_size
        }
    }

    /// Visible rectangle in image space.
    pub fn image_visible_rect(&self) -> Rect {
        content_rect_to_image(self.visible_rect, self.unrotated_content_size(), self.image_size)
    }

    /// Where an image-space rectangle lands in the view.
    pub fn image_rect_to_view(&self, rect: Rect) -> RectF {
        image_rect_to_view(rect, self.unrotated_content_size(), self.image_size, &self.draw_matrix)
    }
}

/// Gesture-driven transform for one content item in one viewport.
pub struct TransformEngine {
    config: ZoomConfig,
    viewport_size: Size,
    content_size: Size,
    image_size: Size,
    rotation: Rotation,
    bounds: ScaleBounds,
    base: Affine2,
    support: Affine2,
    hor_edge: Edge,
    ver_edge: Edge,
    animation: Option<Animation>,
    manual_scaling: bool,
    drag_active: bool,
    dragging: bool,
    parent_intercept: bool,
    last_focus: Option<Vec2>,
    viewport_listeners: Listeners<dyn FnMut(&ViewportState)>,
    rotation_listeners: Listeners<dyn FnMut(Rotation)>,
    scale_listeners: Listeners<dyn FnMut(f32, Vec2)>,
    drag_listeners: Listeners<dyn FnMut(DragEvent)>,
    _single_writer: PhantomData<Rc<()>>,
}

impl TransformEngine {
    /// Creates an engine with no content and no viewport.
    pub fn new(mut config: ZoomConfig) -> Self {
        config.validate();
        Self {
            config,
            viewport_size: Size::default(),
            content_size: Size::default(),
            image_size: Size::default(),
            rotation: Rotation::R0,
            bounds: ScaleBounds::default(),
            base: Affine2::IDENTITY,
            support: Affine2::IDENTITY,
            hor_edge: Edge::None,
            ver_edge: Edge::None,
            animation: None,
            manual_scaling: false,
            drag_active: false,
            dragging: false,
            parent_intercept: false,
            last_focus: None,
            viewport_listeners: Listeners::new(),
            rotation_listeners: Listeners::new(),
            scale_listeners: Listeners::new(),
            drag_listeners: Listeners::new(),
            _single_writer: PhantomData,
        }
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Active configuration.
    pub fn config(&self) -> &ZoomConfig {
        &self.config
    }

    /// Sets the viewport size and re-lays out if it changed.
    pub fn set_viewport_size(&mut self, size: Size) {
        if size != self.viewport_size {
            self.viewport_size = size;
            self.reset();
        }
    }

    /// Sets content that is drawn at full image resolution.
    pub fn set_content_size(&mut self, size: Size) {
        self.set_content(size, size);
    }

    /// Sets the drawn content (e.g. a preview) and the full image it stands for.
    pub fn set_content(&mut self, content: Size, image: Size) {
        if content != self.content_size || image != self.image_size {
            self.content_size = content;
            self.image_size = image;
            self.reset();
        }
    }

    /// Changes the initial layout.
    pub fn set_scale_mode(&mut self, mode: ScaleMode) {
        if mode != self.config.scale_mode {
            self.config.scale_mode = mode;
            self.reset();
        }
    }

    /// Enables or disables read mode for long images.
    pub fn set_read_mode(&mut self, enabled: bool) {
        if enabled != self.config.read_mode {
            self.config.read_mode = enabled;
            self.reset();
        }
    }

    /// Rotates to an absolute angle.
    ///
    /// # Panics
    ///
    /// Panics if `degrees` is not a multiple of 90.
    pub fn rotate_to(&mut self, degrees: i32) {
        let rotation = Rotation::from_degrees(degrees);
        if rotation == self.rotation {
            return;
        }
        debug!(from = %self.rotation, to = %rotation, "rotate");
        self.rotation = rotation;
        self.reset();
        self.rotation_listeners.emit(|l| l(rotation));
    }

    /// Rotates relative to the current angle.
    ///
    /// # Panics
    ///
    /// Panics if `degrees` is not a multiple of 90.
    pub fn rotate_by(&mut self, degrees: i32) {
        self.rotate_to(self.rotation.degrees() + degrees);
    }

    /// Recomputes scales and base layout and clears user pan/zoom.
    pub fn reset(&mut self) {
        self.animation = None;
        self.manual_scaling = false;
        self.drag_active = false;
        self.bounds = ScaleBounds::compute(
            self.content_size,
            self.image_size,
            self.viewport_size,
            self.rotation,
            &self.config,
        );
        self.base = self.compute_base();
        self.support = Affine2::IDENTITY;
        debug!(
            viewport = %self.viewport_size,
            content = %self.content_size,
            image = %self.image_size,
            rotation = %self.rotation,
            mode = self.config.scale_mode.name(),
            min = self.bounds.min,
            max = self.bounds.max,
            init = self.bounds.init,
            "reset transform"
        );
        self.check_and_apply();
    }

    fn compute_base(&self) -> Affine2 {
        if self.viewport_size.is_empty() || self.content_size.is_empty() {
            return Affine2::IDENTITY;
        }
        let rotate = rotation_affine(self.rotation, self.content_size);
        let rotated = self.rotation.rotate_size(self.content_size);
        let (dw, dh) = rotated.to_f32();
        let (vw, vh) = self.viewport_size.to_f32();
        let init = self.bounds.init;
        let scale = Affine2::from_scale(Vec2::splat(init));
        let greater = rotated.width > self.viewport_size.width
            || rotated.height > self.viewport_size.height;
        let read_mode = self.config.read_mode
            && self
                .config
                .long_image
                .is_long_image(rotated.width, rotated.height, self.viewport_size.width, self.viewport_size.height);

        let layout = match self.config.scale_mode {
            _ if read_mode => scale,
            ScaleMode::Center | ScaleMode::CenterCrop => post_translate(
                scale,
                Vec2::new((vw - dw * init) / 2.0, (vh - dh * init) / 2.0),
            ),
            ScaleMode::CenterInside if !greater => post_translate(
                scale,
                Vec2::new((vw - dw * init) / 2.0, (vh - dh * init) / 2.0),
            ),
            ScaleMode::FitStart => scale,
            ScaleMode::FitEnd => post_translate(scale, Vec2::new(0.0, vh - dh * init)),
            ScaleMode::FitCenter | ScaleMode::CenterInside => {
                post_translate(scale, Vec2::new(0.0, (vh - dh * init) / 2.0))
            }
            ScaleMode::FitXY => rect_to_rect(
                RectF::new(0.0, 0.0, dw, dh),
                RectF::new(0.0, 0.0, vw, vh),
            ),
        };
        layout * rotate
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Content to view transform.
    pub fn draw_matrix(&self) -> Affine2 {
        self.support * self.base
    }

    /// Overall draw scale.
    pub fn scale(&self) -> f32 {
        scale_of(&self.draw_matrix())
    }

    /// Scale contributed by the initial layout.
    pub fn base_scale(&self) -> f32 {
        scale_of(&self.base)
    }

    /// Scale contributed by the user.
    pub fn support_scale(&self) -> f32 {
        scale_of(&self.support)
    }

    /// Scale limits for the current layout.
    pub fn scale_bounds(&self) -> &ScaleBounds {
        &self.bounds
    }

    /// Current rotation.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Drawn content size, unrotated.
    pub fn content_size(&self) -> Size {
        self.content_size
    }

    /// Full image size, unrotated.
    pub fn image_size(&self) -> Size {
        self.image_size
    }

    /// Viewport size.
    pub fn viewport_size(&self) -> Size {
        self.viewport_size
    }

    /// Content bounds in view space.
    pub fn draw_rect(&self) -> RectF {
        if self.content_size.is_empty() {
            return RectF::default();
        }
        map_rect(&self.draw_matrix(), RectF::from_size(self.content_size))
    }

    /// Visible part of the content in unrotated content coordinates.
    pub fn visible_rect(&self) -> Rect {
        visible_content_rect(&self.draw_matrix(), self.content_size, self.viewport_size)
    }

    /// Snapshot for consumers.
    pub fn viewport(&self) -> ViewportState {
        let draw_matrix = self.draw_matrix();
        ViewportState {
            scale: scale_of(&draw_matrix),
            translation: draw_matrix.translation,
            rotation: self.rotation,
            content_size: self.rotation.rotate_size(self.content_size),
            image_size: self.image_size,
            viewport_size: self.viewport_size,
            draw_matrix,
            visible_rect: self.visible_rect(),
        }
    }

    /// Content pixel under a view point, or `None` outside the content.
    pub fn touch_point_to_content(&self, point: Vec2) -> Option<(u32, u32)> {
        if self.content_size.is_empty() || !self.draw_rect().contains(point.x, point.y) {
            return None;
        }
        let m = self.draw_matrix();
        if m.matrix2.determinant().abs() <= f32::EPSILON {
            return None;
        }
        let p = m.inverse().transform_point2(point);
        let x = (p.x.round().max(0.0) as u32).min(self.content_size.width);
        let y = (p.y.round().max(0.0) as u32).min(self.content_size.height);
        Some((x, y))
    }

    /// Horizontal and vertical edge classification.
    pub fn edges(&self) -> (Edge, Edge) {
        (self.hor_edge, self.ver_edge)
    }

    /// Whether content can scroll left (`direction < 0`) or right.
    pub fn can_scroll_horizontally(&self, direction: i32) -> bool {
        can_scroll(self.hor_edge, direction)
    }

    /// Whether content can scroll up (`direction < 0`) or down.
    pub fn can_scroll_vertically(&self, direction: i32) -> bool {
        can_scroll(self.ver_edge, direction)
    }

    /// Current activity.
    pub fn state(&self) -> GestureState {
        match self.animation {
            Some(Animation::Scale { .. }) => GestureState::Scaling,
            Some(Animation::Locate { .. }) => GestureState::Locating,
            Some(Animation::Fling(_)) => GestureState::Flinging,
            None if self.manual_scaling => GestureState::Scaling,
            None if self.drag_active => GestureState::Dragging,
            None => GestureState::Idle,
        }
    }

    /// Returns `true` while pinching or animating a zoom.
    pub fn is_zooming(&self) -> bool {
        self.state() == GestureState::Scaling
    }

    /// Returns `true` if an animation needs further ticks.
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Whether the host's scroll container may take over the current drag.
    pub fn parent_intercept_allowed(&self) -> bool {
        self.parent_intercept
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// First pointer went down.
    pub fn pointer_down(&mut self) {
        if self.is_locating() {
            trace!("pointer down ignored while locating");
            return;
        }
        trace!("pointer down");
        self.last_focus = None;
        self.dragging = false;
        self.parent_intercept = false;
        if matches!(self.animation, Some(Animation::Fling(_))) {
            self.animation = None;
        }
    }

    /// One-pointer drag by a view-space delta.
    pub fn pointer_move(&mut self, dx: f32, dy: f32) {
        if self.is_locating() || self.manual_scaling || !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        trace!(dx, dy, "drag");
        self.drag_active = true;
        self.support = post_translate(self.support, Vec2::new(dx, dy));
        self.check_and_apply();
        let delta = Vec2::new(dx, dy);
        self.drag_listeners.emit(|l| l(DragEvent::Drag(delta)));
        self.update_parent_intercept(dx, dy);
    }

    fn update_parent_intercept(&mut self, dx: f32, dy: f32) {
        let disallow = if self.dragging || !self.config.allow_parent_intercept_on_edge {
            true
        } else {
            let slop = self.config.drag_slop;
            let moved = |d: f32, edge: Edge| match edge {
                Edge::None => d.abs() >= slop,
                Edge::Start => d <= -slop,
                Edge::End => d >= slop,
                Edge::Both => false,
            };
            let keep = moved(dx, self.hor_edge) || moved(dy, self.ver_edge);
            self.dragging = keep;
            keep
        };
        self.parent_intercept = !disallow;
        trace!(
            hor = ?self.hor_edge,
            ver = ?self.ver_edge,
            allowed = self.parent_intercept,
            "parent intercept"
        );
    }

    /// Last pointer went up with a release velocity in px/s.
    ///
    /// Starts a fling after a drag, or rolls an out-of-range zoom back into
    /// `[min, max]`.
    pub fn pointer_up(&mut self, velocity: Vec2) {
        if self.is_locating() {
            return;
        }
        let was_dragging = self.drag_active && !self.manual_scaling;
        self.drag_active = false;
        if was_dragging
            && velocity.is_finite()
            && velocity.length() >= self.config.fling_min_velocity
            && self.animation.is_none()
        {
            self.start_fling(velocity);
        }
        self.manual_scaling = false;
        self.roll_back_scale();
    }

    /// Gesture cancelled by the host.
    pub fn pointer_cancel(&mut self) {
        self.pointer_up(Vec2::ZERO);
    }

    fn start_fling(&mut self, velocity: Vec2) {
        trace!(vx = velocity.x, vy = velocity.y, "fling");
        self.animation = Some(Animation::Fling(Fling::new(
            velocity,
            self.config.fling_damping,
            self.config.fling_min_velocity,
        )));
        self.drag_listeners.emit(|l| l(DragEvent::Fling { velocity }));
    }

    /// Two-pointer gesture started.
    pub fn pinch_begin(&mut self) {
        if self.is_locating() {
            return;
        }
        trace!("pinch begin");
        self.animation = None;
        self.drag_active = false;
        self.manual_scaling = true;
    }

    /// Pinch step: scale by `factor` about `focus`, then pan by `pan`.
    ///
    /// Past the scale limits only a fraction of the step is applied.
    pub fn pinch_update(&mut self, factor: f32, focus: Vec2, pan: Vec2) {
        if self.is_locating() || self.bounds.is_empty() {
            return;
        }
        if !(factor.is_finite() && factor > 0.0 && focus.is_finite() && pan.is_finite()) {
            return;
        }
        if !self.manual_scaling {
            self.pinch_begin();
        }
        self.last_focus = Some(focus);

        let old = self.scale();
        let mut factor = factor;
        let beyond = (factor > 1.0 && round2(old) >= round2(self.bounds.max))
            || (factor < 1.0 && round2(old) <= round2(self.bounds.min));
        if beyond && old > 0.0 {
            let damped = old + (old * factor - old) * self.config.rubber_band_factor;
            factor = damped / old;
        }
        trace!(factor, x = focus.x, y = focus.y, "pinch");

        self.support = post_translate(post_scale(self.support, factor, focus), pan);
        self.check_and_apply();
        self.scale_listeners.emit(|l| l(factor, focus));
    }

    /// Two-pointer gesture ended.
    pub fn pinch_end(&mut self) {
        if !self.manual_scaling {
            return;
        }
        trace!("pinch end");
        self.manual_scaling = false;
        if !self.roll_back_scale() {
            self.notify_viewport();
        }
    }

    /// Brings an out-of-range scale back to the nearest limit. Returns
    /// `true` if the scale changed or a roll back animation started.
    ///
    /// A visible overshoot animates back; one that only shows past the
    /// second decimal snaps.
    fn roll_back_scale(&mut self) -> bool {
        if self.bounds.is_empty() || matches!(self.animation, Some(Animation::Scale { .. })) {
            return false;
        }
        let scale = self.scale();
        let target = self.bounds.clamp(scale);
        if target == scale {
            return false;
        }
        let animate = round2(scale) != round2(target);
        let focus = if target < scale {
            self.last_focus.unwrap_or_else(|| self.viewport_center())
        } else {
            let rect = self.draw_rect();
            if rect.is_empty() {
                self.viewport_center()
            } else {
                let (cx, cy) = rect.center();
                Vec2::new(cx, cy)
            }
        };
        trace!(scale, target, animate, "roll back scale");
        self.zoom_to(target, focus, animate);
        true
    }

    /// Double tap: zoom to the next step about `point`.
    pub fn double_tap(&mut self, point: Vec2) {
        if self.bounds.is_empty() || self.is_locating() {
            return;
        }
        let next = self.bounds.next_step(self.scale());
        trace!(next, "double tap");
        self.zoom_to(next, point, true);
    }

    // ------------------------------------------------------------------
    // Programmatic control
    // ------------------------------------------------------------------

    /// Zooms to `scale` (clamped to limits) keeping `focus` fixed in the view.
    pub fn zoom_to(&mut self, scale: f32, focus: Vec2, animate: bool) {
        if self.bounds.is_empty() || !scale.is_finite() {
            return;
        }
        let target = self.bounds.clamp(scale);
        self.animation = None;
        if animate {
            self.animation = Some(Animation::Scale {
                tween: Tween::new(Duration::from_millis(self.config.zoom_duration_ms)),
                from: self.scale(),
                to: target,
                focus,
            });
            // Tile refresh pauses until the animation ends.
            self.notify_viewport();
        } else {
            self.scale_to(target, focus);
        }
    }

    /// Zooms about the viewport center.
    pub fn zoom_to_center(&mut self, scale: f32, animate: bool) {
        let center = self.viewport_center();
        self.zoom_to(scale, center, animate);
    }

    fn scale_to(&mut self, target: f32, focus: Vec2) {
        let current = self.scale();
        if current > 0.0 {
            self.support = post_scale(self.support, target / current, focus);
            self.check_and_apply();
        }
    }

    /// Pans by a view-space delta, clamped to the content.
    pub fn translate_by(&mut self, dx: f32, dy: f32) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.support = post_translate(self.support, Vec2::new(dx, dy));
        self.check_and_apply();
    }

    /// Scrolls so content point `(x, y)` (unrotated content space) is
    /// centered, zooming in to origin scale first if fully zoomed out.
    pub fn location_to(&mut self, x: f32, y: f32, animate: bool) {
        if self.viewport_size.is_empty() || self.content_size.is_empty() {
            return;
        }
        self.animation = None;
        let (rx, ry) = self
            .rotation
            .rotate_point(f64::from(x), f64::from(y), self.content_size);
        if round2(self.scale()) == round2(self.bounds.full) {
            let origin = self.bounds.origin;
            self.zoom_to(origin, self.viewport_center(), false);
        }

        let rect = self.draw_rect();
        let scale = self.scale();
        let (vw, vh) = self.viewport_size.to_f32();
        let target = Vec2::new(
            ((rx as f32 * scale).clamp(0.0, rect.width()) - vw / 2.0).max(0.0),
            ((ry as f32 * scale).clamp(0.0, rect.height()) - vh / 2.0).max(0.0),
        );
        let start = Vec2::new(rect.left.abs(), rect.top.abs());
        debug!(x, y, sx = start.x, sy = start.y, ex = target.x, ey = target.y, "locate");

        if animate {
            self.animation = Some(Animation::Locate {
                tween: Tween::new(Duration::from_millis(self.config.locate_duration_ms)),
                from: start,
                to: target,
                current: start,
            });
        } else {
            let delta = start - target;
            self.translate_by(delta.x, delta.y);
        }
    }

    /// Advances running animations. Returns `true` while more ticks are needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(mut animation) = self.animation.take() else {
            return false;
        };
        let running = match &mut animation {
            Animation::Scale {
                tween,
                from,
                to,
                focus,
            } => {
                let p = tween.progress(now);
                let target = *from + (*to - *from) * p;
                self.scale_to(target, *focus);
                p < 1.0
            }
            Animation::Locate {
                tween,
                from,
                to,
                current,
            } => {
                let p = tween.progress(now);
                let next = *from + (*to - *from) * p;
                let delta = *current - next;
                *current = next;
                if delta != Vec2::ZERO {
                    self.support = post_translate(self.support, delta);
                    self.check_and_apply();
                }
                p < 1.0
            }
            Animation::Fling(fling) => {
                let (delta, going) = fling.step(now);
                if delta != Vec2::ZERO {
                    let before = self.draw_rect();
                    self.support = post_translate(self.support, delta);
                    self.check_and_apply();
                    let after = self.draw_rect();
                    let moved = Vec2::new(after.left - before.left, after.top - before.top);
                    let blocked = (
                        (moved.x - delta.x).abs() > 0.5,
                        (moved.y - delta.y).abs() > 0.5,
                    );
                    fling.stop_axes(blocked);
                }
                going && !fling.is_stopped()
            }
        };

        if running {
            self.animation = Some(animation);
        } else {
            trace!("animation finished");
            // State drops back to idle; consumers that skipped work during
            // the animation get a final update.
            self.notify_viewport();
        }
        running
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Called after every transform change.
    pub fn add_viewport_listener(&mut self, f: impl FnMut(&ViewportState) + 'static) -> ListenerId {
        self.viewport_listeners.add(Box::new(f))
    }

    /// Removes a viewport listener.
    pub fn remove_viewport_listener(&mut self, id: ListenerId) -> bool {
        self.viewport_listeners.remove(id)
    }

    /// Called after the rotation changes.
    pub fn add_rotation_listener(&mut self, f: impl FnMut(Rotation) + 'static) -> ListenerId {
        self.rotation_listeners.add(Box::new(f))
    }

    /// Removes a rotation listener.
    pub fn remove_rotation_listener(&mut self, id: ListenerId) -> bool {
        self.rotation_listeners.remove(id)
    }

    /// Called for every pinch step with the applied factor and focus.
    pub fn add_scale_listener(&mut self, f: impl FnMut(f32, Vec2) + 'static) -> ListenerId {
        self.scale_listeners.add(Box::new(f))
    }

    /// Removes a scale listener.
    pub fn remove_scale_listener(&mut self, id: ListenerId) -> bool {
        self.scale_listeners.remove(id)
    }

    /// Called for drags and fling starts.
    pub fn add_drag_listener(&mut self, f: impl FnMut(DragEvent) + 'static) -> ListenerId {
        self.drag_listeners.add(Box::new(f))
    }

    /// Removes a drag listener.
    pub fn remove_drag_listener(&mut self, id: ListenerId) -> bool {
        self.drag_listeners.remove(id)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_locating(&self) -> bool {
        matches!(self.animation, Some(Animation::Locate { .. }))
    }

    fn viewport_center(&self) -> Vec2 {
        let (w, h) = self.viewport_size.to_f32();
        Vec2::new(w / 2.0, h / 2.0)
    }

    fn check_and_apply(&mut self) {
        if self.check_bounds() {
            self.notify_viewport();
        }
    }

    fn notify_viewport(&mut self) {
        let state = self.viewport();
        self.viewport_listeners.emit(|l| l(&state));
    }

    /// Anchors or clamps the draw rect and reclassifies edges.
    fn check_bounds(&mut self) -> bool {
        let rect = self.draw_rect();
        if rect.is_empty() || self.viewport_size.is_empty() {
            self.hor_edge = Edge::None;
            self.ver_edge = Edge::None;
            return false;
        }
        let (vw, vh) = self.viewport_size.to_f32();
        let mode = self.config.scale_mode;
        let dx = axis_correction(rect.left, rect.right, vw, mode);
        let dy = axis_correction(rect.top, rect.bottom, vh, mode);
        if dx != 0.0 || dy != 0.0 {
            self.support = post_translate(self.support, Vec2::new(dx, dy));
        }

        let rect = rect.offset(dx, dy);
        self.hor_edge = classify_edge(rect.left, rect.right, vw);
        self.ver_edge = classify_edge(rect.top, rect.bottom, vh);
        true
    }
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("viewport", &self.viewport_size)
            .field("content", &self.content_size)
            .field("rotation", &self.rotation)
            .field("scale", &self.scale())
            .field("state", &self.state())
            .finish()
    }
}

/// Translation that anchors a fitting axis or keeps a larger one covering
/// the viewport. Integer truncation matches pixel-snapped layouts.
fn axis_correction(start: f32, end: f32, view: f32, mode: ScaleMode) -> f32 {
    let extent = end - start;
    if extent as i32 <= view as i32 {
        match mode {
            ScaleMode::FitStart => -start,
            ScaleMode::FitEnd => view - extent - start,
            _ => (view - extent) / 2.0 - start,
        }
    } else if start as i32 > 0 {
        -start
    } else if (end as i32) < view as i32 {
        view - end
    } else {
        0.0
    }
}

fn classify_edge(start: f32, end: f32, view: f32) -> Edge {
    if (end - start) as i32 <= view as i32 {
        Edge::Both
    } else if start as i32 >= 0 {
        Edge::Start
    } else if end as i32 <= view as i32 {
        Edge::End
    } else {
        Edge::None
    }
}

fn can_scroll(edge: Edge, direction: i32) -> bool {
    match edge {
        Edge::Both => false,
        Edge::Start => direction >= 0,
        Edge::End => direction < 0,
        Edge::None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    fn engine(content: Size, viewport: Size) -> TransformEngine {
        let mut e = TransformEngine::new(ZoomConfig::default());
        e.set_viewport_size(viewport);
        e.set_content_size(content);
        e
    }

    fn photo() -> TransformEngine {
        engine(Size::new(4000, 3000), Size::new(1000, 800))
    }

    fn settle(e: &mut TransformEngine) {
        let t0 = Instant::now();
        let mut i = 0;
        while e.tick(t0 + Duration::from_millis(i * 16)) {
            i += 1;
            assert!(i < 10_000, "animation never finished");
        }
    }

    #[test]
    fn fit_center_layout() {
        let e = photo();
        assert_relative_eq!(e.scale(), 0.25);
        let r = e.draw_rect();
        assert_relative_eq!(r.left, 0.0);
        assert_relative_eq!(r.top, 25.0);
        assert_relative_eq!(r.bottom, 775.0);
        assert_eq!(e.edges(), (Edge::Both, Edge::Both));
        assert_eq!(e.visible_rect(), Rect::new(0, 0, 4000, 3000));
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn fit_start_and_end_anchor() {
        for (mode, top) in [(ScaleMode::FitStart, 0.0), (ScaleMode::FitEnd, 50.0)] {
            let mut e = photo();
            e.set_scale_mode(mode);
            assert_relative_eq!(e.draw_rect().top, top);
        }
    }

    #[test]
    fn zoom_to_origin_centered() {
        let mut e = photo();
        e.zoom_to_center(1.0, false);
        assert_relative_eq!(e.scale(), 1.0, epsilon = 1e-5);
        assert_eq!(e.visible_rect(), Rect::new(1500, 1100, 1000, 800));
        assert_eq!(e.edges(), (Edge::None, Edge::None));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut e = photo();
        e.zoom_to_center(100.0, false);
        assert_relative_eq!(e.scale(), 2.0, epsilon = 1e-5);
        e.zoom_to_center(0.01, false);
        assert_relative_eq!(e.scale(), 0.25, epsilon = 1e-5);
    }

    #[test]
    fn rotation_swaps_content_size() {
        let mut e = photo();
        e.rotate_to(90);
        let vp = e.viewport();
        assert_eq!(vp.content_size, Size::new(3000, 4000));
        assert_eq!(vp.unrotated_content_size(), Size::new(4000, 3000));
        assert_relative_eq!(e.scale(), 0.2, epsilon = 1e-6);

        e.zoom_to_center(1.0, false);
        let visible = e.visible_rect();
        assert_eq!(visible.size(), Size::new(800, 1000));
        assert_eq!(visible, Rect::new(1600, 1000, 800, 1000));
    }

    #[test]
    fn rotate_by_wraps() {
        let mut e = photo();
        e.rotate_by(-90);
        assert_eq!(e.rotation(), Rotation::R270);
        e.rotate_by(180);
        assert_eq!(e.rotation(), Rotation::R90);
    }

    #[test]
    #[should_panic(expected = "multiple of 90")]
    fn rotate_rejects_odd_angles() {
        photo().rotate_to(45);
    }

    #[test]
    fn drag_is_clamped_at_edges() {
        let mut e = photo();
        e.zoom_to_center(1.0, false);
        e.pointer_down();
        e.pointer_move(5000.0, 0.0);
        assert_relative_eq!(e.draw_rect().left, 0.0);
        assert_eq!(e.edges().0, Edge::Start);
        assert!(!e.can_scroll_horizontally(-1));
        assert!(e.can_scroll_horizontally(1));
        assert_eq!(e.state(), GestureState::Dragging);
        e.pointer_up(Vec2::ZERO);
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn parent_takes_over_at_edge() {
        let mut e = photo();
        // Fully fitting content: every drag goes to the parent.
        e.pointer_down();
        e.pointer_move(10.0, 0.0);
        assert!(e.parent_intercept_allowed());

        e.zoom_to_center(1.0, false);
        e.pointer_down();
        e.pointer_move(-10.0, 0.0);
        assert!(!e.parent_intercept_allowed());
    }

    #[test]
    fn rubber_band_damps_overshoot() {
        let mut e = photo();
        e.zoom_to_center(2.0, false);
        e.pointer_down();
        e.pinch_begin();
        e.pinch_update(2.0, Vec2::new(500.0, 400.0), Vec2::ZERO);
        // 2.0 + (4.0 - 2.0) * 0.4
        assert_relative_eq!(e.scale(), 2.8, epsilon = 1e-4);
        assert!(e.is_zooming());

        e.pinch_end();
        e.pointer_up(Vec2::ZERO);
        assert_eq!(e.state(), GestureState::Scaling);
        settle(&mut e);
        assert_relative_eq!(e.scale(), 2.0, epsilon = 1e-4);
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn pinch_below_min_rolls_back() {
        let mut e = photo();
        e.pinch_begin();
        e.pinch_update(0.5, Vec2::new(500.0, 400.0), Vec2::ZERO);
        assert!(e.scale() < 0.25);
        e.pinch_end();
        settle(&mut e);
        assert_relative_eq!(e.scale(), 0.25, epsilon = 1e-4);
    }

    #[test]
    fn slight_pinch_below_min_snaps_to_min() {
        let mut e = photo();
        e.pinch_begin();
        e.pinch_update(0.98, Vec2::new(500.0, 400.0), Vec2::ZERO);
        assert!(e.scale() < 0.25);
        assert_eq!(round2(e.scale()), 0.25);

        e.pinch_end();
        e.pointer_up(Vec2::ZERO);
        settle(&mut e);
        assert!(e.scale() >= 0.25 - 1e-5, "scale {}", e.scale());
        assert_relative_eq!(e.scale(), 0.25, epsilon = 1e-4);
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn slight_pinch_above_max_snaps_to_max() {
        let mut e = photo();
        let max = e.scale_bounds().max;
        e.zoom_to_center(max, false);
        e.pinch_begin();
        // Damped to 0.4 of the step, so well under half a hundredth.
        e.pinch_update(1.002, Vec2::new(500.0, 400.0), Vec2::ZERO);
        assert!(e.scale() > max);

        e.pinch_end();
        settle(&mut e);
        assert!(e.scale() <= max + 1e-5, "scale {} max {max}", e.scale());
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn fling_coasts_and_stops() {
        let mut e = photo();
        e.zoom_to_center(1.0, false);
        e.pointer_down();
        e.pointer_move(-1.0, 0.0);
        let left = e.draw_rect().left;
        e.pointer_up(Vec2::new(-2000.0, 0.0));
        assert_eq!(e.state(), GestureState::Flinging);
        settle(&mut e);
        assert!(e.draw_rect().left < left);
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn slow_release_does_not_fling() {
        let mut e = photo();
        e.zoom_to_center(1.0, false);
        e.pointer_down();
        e.pointer_move(-1.0, 0.0);
        e.pointer_up(Vec2::new(-10.0, 0.0));
        assert_eq!(e.state(), GestureState::Idle);
    }

    #[test]
    fn location_centers_point() {
        let mut e = photo();
        e.location_to(3000.0, 2000.0, false);
        // Jumped from full to origin scale first.
        assert_relative_eq!(e.scale(), 1.0, epsilon = 1e-5);
        assert_eq!(e.visible_rect(), Rect::new(2500, 1600, 1000, 800));
    }

    #[test]
    fn animated_location_blocks_touch() {
        let mut e = photo();
        e.zoom_to_center(1.0, false);
        e.location_to(500.0, 400.0, true);
        assert_eq!(e.state(), GestureState::Locating);
        e.pointer_down();
        e.pointer_move(100.0, 0.0);
        settle(&mut e);
        assert_eq!(e.visible_rect(), Rect::new(0, 0, 1000, 800));
    }

    #[test]
    fn double_tap_cycles_steps() {
        let mut e = photo();
        e.double_tap(Vec2::new(500.0, 400.0));
        settle(&mut e);
        assert_relative_eq!(e.scale(), 1.0, epsilon = 1e-4);
        e.double_tap(Vec2::new(500.0, 400.0));
        settle(&mut e);
        assert_relative_eq!(e.scale(), 2.0, epsilon = 1e-4);
        e.double_tap(Vec2::new(500.0, 400.0));
        settle(&mut e);
        assert_relative_eq!(e.scale(), 0.25, epsilon = 1e-4);
    }

    #[test]
    fn touch_point_maps_to_content() {
        let e = photo();
        assert_eq!(e.touch_point_to_content(Vec2::new(500.0, 400.0)), Some((2000, 1500)));
        assert_eq!(e.touch_point_to_content(Vec2::new(500.0, 10.0)), None);
    }

    #[test]
    fn listeners_observe_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let rotations = Rc::new(RefCell::new(Vec::new()));
        let mut e = photo();
        let id = {
            let seen = Rc::clone(&seen);
            e.add_viewport_listener(move |vp| seen.borrow_mut().push(vp.scale))
        };
        {
            let rotations = Rc::clone(&rotations);
            e.add_rotation_listener(move |r| rotations.borrow_mut().push(r));
        }
        e.zoom_to_center(1.0, false);
        e.rotate_to(180);
        assert!(!seen.borrow().is_empty());
        assert_eq!(*rotations.borrow(), vec![Rotation::R180]);

        assert!(e.remove_viewport_listener(id));
        let n = seen.borrow().len();
        e.translate_by(10.0, 0.0);
        assert_eq!(seen.borrow().len(), n);
    }

    #[test]
    fn empty_engine_is_inert() {
        let mut e = TransformEngine::new(ZoomConfig::default());
        e.pointer_down();
        e.pointer_move(10.0, 10.0);
        e.pinch_update(2.0, Vec2::ZERO, Vec2::ZERO);
        e.zoom_to_center(2.0, true);
        assert!(!e.tick(Instant::now()));
        assert_eq!(e.visible_rect(), Rect::default());
        assert_eq!(e.edges(), (Edge::None, Edge::None));
    }
}
