use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geometry::{point_to_segment_dist, polygon_contains, Bounds, Point};
use crate::style::{Color, HighlightStyle, ShapeStyle, StyleState};
use crate::text::TextBox;

/// Stable identity of an object on the canvas. Never reused.
pub type ObjectId = u64;

/// Shapes the draw tool can create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Rectangle,
    Circle,
    Triangle,
    Ellipse,
    Polygon,
    Highlight,
    Cover,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 8] = [
        ShapeKind::Line,
        ShapeKind::Rectangle,
        ShapeKind::Circle,
        ShapeKind::Triangle,
        ShapeKind::Ellipse,
        ShapeKind::Polygon,
        ShapeKind::Highlight,
        ShapeKind::Cover,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Line => "line",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Polygon => "polygon",
            ShapeKind::Highlight => "highlight",
            ShapeKind::Cover => "cover",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ShapeKind::Line => "Line",
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Circle => "Circle",
            ShapeKind::Triangle => "Triangle",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Polygon => "Polygon",
            ShapeKind::Highlight => "Highlight",
            ShapeKind::Cover => "Cover",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shape kind '{0}'")]
pub struct UnknownShapeKind(pub String);

impl FromStr for ShapeKind {
    type Err = UnknownShapeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownShapeKind(s.to_string()))
    }
}

// ── Drawable objects ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Line { start: Point, end: Point },
    Rectangle(Bounds),
    Triangle(Bounds),
    Highlight(Bounds),
    Cover(Bounds),
    Circle { center: Point, radius: f32 },
    Ellipse { center: Point, rx: f32, ry: f32 },
    Polygon { points: Vec<Point> },
    Text(TextBox),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Drawable {
    pub id: ObjectId,
    pub geometry: Geometry,
    /// Unused by text, which carries its own color in its `TextStyle`.
    pub style: ShapeStyle,
    pub selectable: bool,
    pub lock_movement_x: bool,
    pub lock_movement_y: bool,
}

impl Drawable {
    /// A fresh object. Its id is assigned when it is added to a canvas.
    pub fn new(geometry: Geometry, style: ShapeStyle, interactive: bool) -> Self {
        Self {
            id: 0,
            geometry,
            style,
            selectable: interactive,
            lock_movement_x: !interactive,
            lock_movement_y: !interactive,
        }
    }

    pub fn shape_kind(&self) -> Option<ShapeKind> {
        Some(match self.geometry {
            Geometry::Line { .. } => ShapeKind::Line,
            Geometry::Rectangle(_) => ShapeKind::Rectangle,
            Geometry::Triangle(_) => ShapeKind::Triangle,
            Geometry::Highlight(_) => ShapeKind::Highlight,
            Geometry::Cover(_) => ShapeKind::Cover,
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Ellipse { .. } => ShapeKind::Ellipse,
            Geometry::Polygon { .. } => ShapeKind::Polygon,
            Geometry::Text(_) => return None,
        })
    }

    pub fn text(&self) -> Option<&TextBox> {
        match &self.geometry {
            Geometry::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut TextBox> {
        match &mut self.geometry {
            Geometry::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.text().is_some()
    }

    pub fn is_editing(&self) -> bool {
        self.text().is_some_and(|t| t.editing)
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.selectable = interactive;
        self.lock_movement_x = !interactive;
        self.lock_movement_y = !interactive;
    }

    pub fn bounds(&self) -> Bounds {
        match &self.geometry {
            Geometry::Line { start, end } => Bounds::from_corners(*start, *end),
            Geometry::Rectangle(b)
            | Geometry::Triangle(b)
            | Geometry::Highlight(b)
            | Geometry::Cover(b) => *b,
            Geometry::Circle { center, radius } => Bounds {
                left: center.x - radius,
                top: center.y - radius,
                width: radius * 2.0,
                height: radius * 2.0,
            },
            Geometry::Ellipse { center, rx, ry } => Bounds {
                left: center.x - rx,
                top: center.y - ry,
                width: rx * 2.0,
                height: ry * 2.0,
            },
            Geometry::Polygon { points } => {
                Bounds::from_points(points).unwrap_or_default()
            }
            Geometry::Text(text) => text.approx_bounds(),
        }
    }

    /// Top-left of the object's box (`left`, `top`).
    pub fn position(&self) -> Point {
        self.bounds().origin()
    }

    pub fn contains(&self, p: Point, tolerance: f32) -> bool {
        let slack = tolerance + self.style.stroke_width * 0.5;
        match &self.geometry {
            Geometry::Line { start, end } => point_to_segment_dist(p, *start, *end) <= slack,
            Geometry::Rectangle(b) | Geometry::Highlight(b) | Geometry::Cover(b) => {
                b.expand(slack).contains(p)
            }
            Geometry::Triangle(b) => {
                let pts = triangle_points(b);
                polygon_contains(&pts, p) || near_outline(&pts, p, slack)
            }
            Geometry::Circle { center, radius } => p.distance(*center) <= radius + slack,
            Geometry::Ellipse { center, rx, ry } => {
                let (rx, ry) = (rx + slack, ry + slack);
                let nx = (p.x - center.x) / rx;
                let ny = (p.y - center.y) / ry;
                nx * nx + ny * ny <= 1.0
            }
            Geometry::Polygon { points } => {
                polygon_contains(points, p) || near_outline(points, p, slack)
            }
            Geometry::Text(text) => text.approx_bounds().expand(tolerance).contains(p),
        }
    }

    /// Move by a delta, honouring the per-axis movement locks.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        let dx = if self.lock_movement_x { 0.0 } else { dx };
        let dy = if self.lock_movement_y { 0.0 } else { dy };
        self.translate(dx, dy);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        match &mut self.geometry {
            Geometry::Line { start, end } => {
                *start = start.offset(dx, dy);
                *end = end.offset(dx, dy);
            }
            Geometry::Rectangle(b)
            | Geometry::Triangle(b)
            | Geometry::Highlight(b)
            | Geometry::Cover(b) => b.translate(dx, dy),
            Geometry::Circle { center, .. } | Geometry::Ellipse { center, .. } => {
                *center = center.offset(dx, dy);
            }
            Geometry::Polygon { points } => {
                for p in points {
                    *p = p.offset(dx, dy);
                }
            }
            Geometry::Text(text) => text.origin = text.origin.offset(dx, dy),
        }
    }

    /// Style as shown by the shape controls. Text reports its color as the
    /// stroke color.
    pub fn shape_style(&self) -> ShapeStyle {
        match &self.geometry {
            Geometry::Text(text) => ShapeStyle {
                stroke: text.style.color,
                ..self.style
            },
            _ => self.style,
        }
    }

    /// Push the shape controls onto this object. Highlight and cover keep
    /// their fixed styling; lines keep their fill in step with the stroke.
    pub fn apply_shape_style(&mut self, style: &ShapeStyle) {
        match &mut self.geometry {
            Geometry::Highlight(_) | Geometry::Cover(_) => {}
            Geometry::Text(text) => text.style.color = style.stroke,
            Geometry::Line { .. } => {
                self.style = ShapeStyle {
                    fill: Some(style.stroke),
                    ..*style
                };
            }
            _ => self.style = *style,
        }
    }

    pub fn apply_highlight(&mut self, highlight: &HighlightStyle) {
        if let Geometry::Highlight(_) = self.geometry {
            self.style.fill = Some(highlight.fill());
        }
    }

    pub fn apply_cover(&mut self, color: Color) {
        if let Geometry::Cover(_) = self.geometry {
            self.style.fill = Some(color.with_alpha(255));
        }
    }

    /// Grab points for resizing: the endpoints of a line, the box corners
    /// of any other shape. Text has none.
    pub fn handles(&self) -> Vec<Point> {
        match &self.geometry {
            Geometry::Line { start, end } => vec![*start, *end],
            Geometry::Text(_) => Vec::new(),
            _ => {
                let b = self.bounds();
                vec![
                    b.origin(),
                    Point::new(b.right(), b.top),
                    Point::new(b.right(), b.bottom()),
                    Point::new(b.left, b.bottom()),
                ]
            }
        }
    }

    /// The fixed point of a resize grabbed at `p`: the opposite corner, or
    /// the other end of a line. `None` when `p` is on no handle or the
    /// object is locked.
    pub fn resize_anchor(&self, p: Point, tolerance: f32) -> Option<Point> {
        if self.lock_movement_x && self.lock_movement_y {
            return None;
        }
        let handles = self.handles();
        let n = handles.len();
        let grabbed = handles.iter().position(|h| h.distance(p) <= tolerance)?;
        Some(handles[(grabbed + n / 2) % n])
    }
}

/// Refit `original` to the box spanned by `anchor` and `current`. Used
/// while a handle is dragged; every step starts from the geometry the
/// object had when the drag began.
pub fn resize_geometry(original: &Geometry, anchor: Point, current: Point) -> Geometry {
    let target = Bounds::from_corners(anchor, current);
    match original {
        Geometry::Line { .. } => Geometry::Line {
            start: anchor,
            end: current,
        },
        Geometry::Rectangle(_) => Geometry::Rectangle(target),
        Geometry::Triangle(_) => Geometry::Triangle(target),
        Geometry::Highlight(_) => Geometry::Highlight(target),
        Geometry::Cover(_) => Geometry::Cover(target),
        Geometry::Ellipse { .. } => Geometry::Ellipse {
            center: target.center(),
            rx: target.width / 2.0,
            ry: target.height / 2.0,
        },
        Geometry::Circle { .. } => {
            // Stays round: the larger side wins, growing away from the anchor.
            let radius = target.width.max(target.height) / 2.0;
            let sx = if current.x < anchor.x { -1.0 } else { 1.0 };
            let sy = if current.y < anchor.y { -1.0 } else { 1.0 };
            Geometry::Circle {
                center: anchor.offset(sx * radius, sy * radius),
                radius,
            }
        }
        Geometry::Polygon { points } => {
            let from = Bounds::from_points(points).unwrap_or_default();
            let scale = |v: f32, lo: f32, len: f32| if len > 0.0 { (v - lo) / len } else { 0.0 };
            Geometry::Polygon {
                points: points
                    .iter()
                    .map(|p| {
                        Point::new(
                            target.left + scale(p.x, from.left, from.width) * target.width,
                            target.top + scale(p.y, from.top, from.height) * target.height,
                        )
                    })
                    .collect(),
            }
        }
        Geometry::Text(text) => Geometry::Text(text.clone()),
    }
}

/// Apex at the top centre, base along the bottom edge.
pub fn triangle_points(b: &Bounds) -> [Point; 3] {
    [
        Point::new(b.center().x, b.top),
        Point::new(b.right(), b.bottom()),
        Point::new(b.left, b.bottom()),
    ]
}

pub fn ellipse_points(center: Point, rx: f32, ry: f32, segments: usize) -> Vec<Point> {
    let segments = segments.max(3);
    (0..segments)
        .map(|i| {
            let t = i as f32 / segments as f32 * std::f32::consts::TAU;
            Point::new(center.x + rx * t.cos(), center.y + ry * t.sin())
        })
        .collect()
}

fn near_outline(points: &[Point], p: Point, slack: f32) -> bool {
    (0..points.len()).any(|i| {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        point_to_segment_dist(p, a, b) <= slack
    })
}

// ── Shape factory & drag-to-resize ──────────────────────────────────────────

/// Build a zero-extent shape of `kind` anchored at `at`, styled from the
/// current style state.
pub fn create_shape(kind: ShapeKind, at: Point, style: &StyleState, interactive: bool) -> Drawable {
    let shape_style = style.shape;
    let (geometry, style) = match kind {
        ShapeKind::Line => (
            Geometry::Line { start: at, end: at },
            ShapeStyle {
                fill: Some(shape_style.stroke),
                ..shape_style
            },
        ),
        ShapeKind::Rectangle => (Geometry::Rectangle(Bounds::at(at)), shape_style),
        ShapeKind::Triangle => (Geometry::Triangle(Bounds::at(at)), shape_style),
        ShapeKind::Circle => (
            Geometry::Circle {
                center: at,
                radius: 0.0,
            },
            shape_style,
        ),
        ShapeKind::Ellipse => (
            Geometry::Ellipse {
                center: at,
                rx: 0.0,
                ry: 0.0,
            },
            shape_style,
        ),
        ShapeKind::Polygon => (
            Geometry::Polygon {
                points: vec![at; 3],
            },
            shape_style,
        ),
        ShapeKind::Highlight => (
            Geometry::Highlight(Bounds::at(at)),
            ShapeStyle {
                stroke: Color::TRANSPARENT,
                stroke_width: 0.0,
                fill: Some(style.highlight.fill()),
            },
        ),
        ShapeKind::Cover => (
            Geometry::Cover(Bounds::at(at)),
            ShapeStyle {
                stroke: Color::TRANSPARENT,
                stroke_width: 0.0,
                fill: Some(style.cover.with_alpha(255)),
            },
        ),
    };
    Drawable::new(geometry, style, interactive)
}

/// Recompute the extent of a shape being drawn from the drag start to the
/// current pointer. Boxes stay anchored at the start corner in whichever
/// direction the pointer moves.
pub fn update_shape(object: &mut Drawable, start: Point, current: Point) {
    match &mut object.geometry {
        Geometry::Line { end, .. } => *end = current,
        Geometry::Rectangle(b)
        | Geometry::Triangle(b)
        | Geometry::Highlight(b)
        | Geometry::Cover(b) => *b = Bounds::from_corners(start, current),
        Geometry::Circle { center, radius } => {
            // The drag spans the diameter.
            *center = start.midpoint(current);
            *radius = start.distance(current) / 2.0;
        }
        Geometry::Ellipse { center, rx, ry } => {
            *center = start.midpoint(current);
            *rx = (current.x - start.x).abs() / 2.0;
            *ry = (current.y - start.y).abs() / 2.0;
        }
        Geometry::Polygon { points } => {
            *points = vec![
                start,
                Point::new(current.x, start.y),
                Point::new((start.x + current.x) / 2.0, current.y),
            ];
        }
        Geometry::Text(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawn(kind: ShapeKind, from: Point, to: Point) -> Drawable {
        let mut obj = create_shape(kind, from, &StyleState::default(), false);
        update_shape(&mut obj, from, to);
        obj
    }

    #[test]
    fn zero_drag_is_zero_extent_for_every_kind() {
        let p = Point::new(42.0, 17.0);
        for kind in ShapeKind::ALL {
            let obj = drawn(kind, p, p);
            let b = obj.bounds();
            assert_eq!(b.width, 0.0, "{kind}");
            assert_eq!(b.height, 0.0, "{kind}");
            assert_eq!(b.origin(), p, "{kind}");
        }
    }

    #[test]
    fn boxes_anchor_correctly_when_dragged_up_left() {
        for kind in [
            ShapeKind::Rectangle,
            ShapeKind::Triangle,
            ShapeKind::Highlight,
            ShapeKind::Cover,
        ] {
            let obj = drawn(kind, Point::new(100.0, 100.0), Point::new(50.0, 50.0));
            let b = obj.bounds();
            assert_eq!(b.origin(), Point::new(50.0, 50.0), "{kind}");
            assert_eq!((b.width, b.height), (50.0, 50.0), "{kind}");
        }
    }

    #[test]
    fn circle_radius_is_half_the_drag() {
        let obj = drawn(ShapeKind::Circle, Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        match obj.geometry {
            Geometry::Circle { center, radius } => {
                assert_eq!(radius, 5.0);
                assert_eq!(center, Point::new(5.0, 0.0));
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn ellipse_radii_and_polygon_vertices() {
        let from = Point::new(10.0, 10.0);
        let to = Point::new(30.0, 50.0);
        match drawn(ShapeKind::Ellipse, from, to).geometry {
            Geometry::Ellipse { rx, ry, .. } => assert_eq!((rx, ry), (10.0, 20.0)),
            other => panic!("unexpected geometry {other:?}"),
        }
        match drawn(ShapeKind::Polygon, from, to).geometry {
            Geometry::Polygon { points } => assert_eq!(
                points,
                vec![from, Point::new(30.0, 10.0), Point::new(20.0, 50.0)]
            ),
            other => panic!("unexpected geometry {other:?}"),
        }
        match drawn(ShapeKind::Line, from, to).geometry {
            Geometry::Line { start, end } => assert_eq!((start, end), (from, to)),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn special_fills() {
        let style = StyleState {
            shape: ShapeStyle {
                stroke: Color::rgb(200, 0, 0),
                stroke_width: 4.0,
                fill: Some(Color::WHITE),
            },
            ..StyleState::default()
        };
        let p = Point::new(0.0, 0.0);

        let line = create_shape(ShapeKind::Line, p, &style, false);
        assert_eq!(line.style.fill, Some(Color::rgb(200, 0, 0)));

        let hl = create_shape(ShapeKind::Highlight, p, &style, false);
        assert_eq!(hl.style.stroke_width, 0.0);
        assert_eq!(hl.style.fill, Some(style.highlight.fill()));
        assert!(hl.style.fill.is_some_and(|c| c.a < 255));

        let cover = create_shape(ShapeKind::Cover, p, &style, false);
        assert_eq!(cover.style.fill, Some(Color::BLACK));
        assert_eq!(cover.style.stroke_width, 0.0);
    }

    #[test]
    fn locked_objects_do_not_move() {
        let mut obj = drawn(
            ShapeKind::Rectangle,
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
        );
        obj.move_by(5.0, 5.0);
        assert_eq!(obj.position(), Point::new(0.0, 0.0));

        obj.set_interactive(true);
        obj.move_by(5.0, -2.0);
        assert_eq!(obj.position(), Point::new(5.0, -2.0));
    }

    #[test]
    fn hit_testing() {
        let line = drawn(ShapeKind::Line, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(line.contains(Point::new(50.0, 2.0), 2.0));
        assert!(!line.contains(Point::new(50.0, 20.0), 2.0));

        let circle = drawn(ShapeKind::Circle, Point::new(0.0, 0.0), Point::new(20.0, 0.0));
        assert!(circle.contains(Point::new(10.0, 5.0), 0.0));
        assert!(!circle.contains(Point::new(10.0, 15.0), 0.0));

        let tri = drawn(ShapeKind::Triangle, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        assert!(tri.contains(Point::new(10.0, 15.0), 0.0));
        assert!(!tri.contains(Point::new(1.0, 1.0), 0.0));
    }

    #[test]
    fn shape_kind_names_round_trip() {
        for kind in ShapeKind::ALL {
            assert_eq!(kind.name().parse::<ShapeKind>(), Ok(kind));
        }
        assert!("hexagon".parse::<ShapeKind>().is_err());
    }

    #[test]
    fn cover_ignores_style_controls() {
        let mut cover = drawn(ShapeKind::Cover, Point::new(0.0, 0.0), Point::new(5.0, 5.0));
        let before = cover.style;
        cover.apply_shape_style(&ShapeStyle {
            stroke: Color::WHITE,
            stroke_width: 9.0,
            fill: None,
        });
        assert_eq!(cover.style, before);
    }

    #[test]
    fn ellipse_anchors_when_dragged_up_left() {
        let obj = drawn(ShapeKind::Ellipse, Point::new(60.0, 40.0), Point::new(20.0, 10.0));
        assert_eq!(
            obj.bounds(),
            Bounds {
                left: 20.0,
                top: 10.0,
                width: 40.0,
                height: 30.0
            }
        );
    }

    #[test]
    fn corner_handle_resizes_against_opposite_corner() {
        let mut rect = drawn(
            ShapeKind::Rectangle,
            Point::new(10.0, 10.0),
            Point::new(50.0, 50.0),
        );
        assert_eq!(rect.resize_anchor(Point::new(50.0, 50.0), 4.0), None);

        rect.set_interactive(true);
        let anchor = rect
            .resize_anchor(Point::new(49.0, 51.0), 4.0)
            .expect("bottom-right handle");
        assert_eq!(anchor, Point::new(10.0, 10.0));
        assert_eq!(rect.resize_anchor(Point::new(30.0, 30.0), 4.0), None);

        rect.geometry = resize_geometry(&rect.geometry, anchor, Point::new(70.0, 70.0));
        assert_eq!(
            rect.bounds(),
            Bounds {
                left: 10.0,
                top: 10.0,
                width: 60.0,
                height: 60.0
            }
        );
    }

    #[test]
    fn line_handles_are_its_endpoints() {
        let mut line = drawn(ShapeKind::Line, Point::new(0.0, 0.0), Point::new(40.0, 0.0));
        line.set_interactive(true);
        let anchor = line
            .resize_anchor(Point::new(0.0, 1.0), 4.0)
            .expect("start handle");
        assert_eq!(anchor, Point::new(40.0, 0.0));
        match resize_geometry(&line.geometry, anchor, Point::new(20.0, 30.0)) {
            Geometry::Line { start, end } => {
                assert_eq!((start, end), (Point::new(40.0, 0.0), Point::new(20.0, 30.0)))
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn resized_circle_and_polygon_keep_their_form() {
        let circle = drawn(ShapeKind::Circle, Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        match resize_geometry(&circle.geometry, Point::new(0.0, -5.0), Point::new(20.0, 10.0)) {
            Geometry::Circle { center, radius } => {
                assert_eq!(radius, 10.0);
                assert_eq!(center, Point::new(10.0, 5.0));
            }
            other => panic!("unexpected geometry {other:?}"),
        }

        let poly = drawn(ShapeKind::Polygon, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        match resize_geometry(&poly.geometry, Point::new(0.0, 0.0), Point::new(20.0, 40.0)) {
            Geometry::Polygon { points } => assert_eq!(
                points,
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(20.0, 0.0),
                    Point::new(10.0, 40.0)
                ]
            ),
            other => panic!("unexpected geometry {other:?}"),
        }
    }
}
