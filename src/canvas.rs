use image::RgbaImage;

use crate::geometry::Point;
use crate::shape::{Drawable, ObjectId};

/// The drawing surface: one background image plus the user's annotations
/// in stacking order (last drawn on top).
///
/// The background is held apart from `objects`, so deleting and counting
/// annotations can never touch it.
#[derive(Clone, Debug, Default)]
pub struct Canvas {
    width: u32,
    height: u32,
    background: Option<RgbaImage>,
    objects: Vec<Drawable>,
    next_id: ObjectId,
    active: Option<ObjectId>,
    dirty: bool,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            ..Default::default()
        }
    }

    /// A canvas at the image's native size with the image as background.
    pub fn with_background(image: RgbaImage) -> Self {
        let mut canvas = Self::new(image.width(), image.height());
        canvas.background = Some(image);
        canvas
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Option<&RgbaImage> {
        self.background.as_ref()
    }

    pub fn objects(&self) -> &[Drawable] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Drawable> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Drawable> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Adds on top of the stack and returns the assigned id.
    pub fn add(&mut self, mut object: Drawable) -> ObjectId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        object.id = id;
        log::debug!("add object {id} ({:?})", object.shape_kind());
        self.objects.push(object);
        self.dirty = true;
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Drawable> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        self.dirty = true;
        log::debug!("remove object {id}");
        Some(self.objects.remove(index))
    }

    pub fn active_id(&self) -> Option<ObjectId> {
        self.active
    }

    pub fn active(&self) -> Option<&Drawable> {
        self.active.and_then(|id| self.get(id))
    }

    /// Ids that are not on the canvas are ignored.
    pub fn set_active(&mut self, id: Option<ObjectId>) {
        self.active = id.filter(|id| self.get(*id).is_some());
    }

    /// Topmost object under `p`.
    pub fn object_at(&self, p: Point, tolerance: f32) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.contains(p, tolerance))
            .map(|o| o.id)
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        for object in &mut self.objects {
            object.set_interactive(interactive);
        }
    }

    /// Replace the annotation list wholesale (undo/redo). Ids keep counting
    /// up so restored and new objects never collide.
    pub fn restore(&mut self, objects: Vec<Drawable>) {
        let max_id = objects.iter().map(|o| o.id).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id + 1);
        self.objects = objects;
        if let Some(id) = self.active {
            if self.get(id).is_none() {
                self.active = None;
            }
        }
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{create_shape, ShapeKind};
    use crate::style::StyleState;

    fn rect_at(x: f32, y: f32) -> Drawable {
        let mut obj = create_shape(ShapeKind::Rectangle, Point::new(x, y), &StyleState::default(), true);
        crate::shape::update_shape(&mut obj, Point::new(x, y), Point::new(x + 10.0, y + 10.0));
        obj
    }

    #[test]
    fn ids_are_stable_and_unique() {
        let mut canvas = Canvas::new(100, 100);
        let a = canvas.add(rect_at(0.0, 0.0));
        let b = canvas.add(rect_at(20.0, 0.0));
        assert_ne!(a, b);
        canvas.remove(a);
        let c = canvas.add(rect_at(40.0, 0.0));
        assert!(c > b);
        assert_eq!(canvas.get(b).map(|o| o.id), Some(b));
    }

    #[test]
    fn removing_active_clears_selection() {
        let mut canvas = Canvas::new(100, 100);
        let id = canvas.add(rect_at(0.0, 0.0));
        canvas.set_active(Some(id));
        assert_eq!(canvas.active_id(), Some(id));
        canvas.remove(id);
        assert_eq!(canvas.active_id(), None);

        canvas.set_active(Some(999));
        assert_eq!(canvas.active_id(), None);
    }

    #[test]
    fn topmost_object_wins_hit_test() {
        let mut canvas = Canvas::new(100, 100);
        let below = canvas.add(rect_at(0.0, 0.0));
        let above = canvas.add(rect_at(5.0, 5.0));
        assert_eq!(canvas.object_at(Point::new(7.0, 7.0), 0.0), Some(above));
        assert_eq!(canvas.object_at(Point::new(1.0, 1.0), 0.0), Some(below));
        assert_eq!(canvas.object_at(Point::new(90.0, 90.0), 0.0), None);
    }

    #[test]
    fn restore_keeps_ids_monotonic() {
        let mut canvas = Canvas::new(100, 100);
        let first = canvas.add(rect_at(0.0, 0.0));
        let snapshot = canvas.objects().to_vec();
        let second = canvas.add(rect_at(10.0, 0.0));
        canvas.set_active(Some(second));

        canvas.restore(snapshot);
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.active_id(), None);
        let third = canvas.add(rect_at(20.0, 0.0));
        assert!(third > second && third > first);
    }
}
