//! Primitive rendering and CPU hit testing.
//!
//! Draws a composited primitive list onto an egui painter and answers
//! "what is under the pointer" with the picking color a GPU read-back
//! would have produced.

use super::projection::{from_unit_vector, unit_vector};
use super::{
    ArcPrimitive, ArcSpan, LabelPrimitive, MapProjection, MarkerPrimitive, PathPrimitive, PickHit,
    Primitive, PrimitiveBody, ProjectionMode, Rgb,
};
use crate::map::Theme;
use eframe::egui::{Color32, FontId, Painter, Pos2, Rect, Stroke, Vec2};
use geo_types::Coord;
use std::f32::consts::PI;
use std::rc::Rc;

/// Samples per great-circle arc.
const ARC_SAMPLES: usize = 24;

/// Extra hit radius around strokes and markers, in pixels.
const PICK_SLOP: f32 = 3.0;

/// Arc height in pixels per unit of elevation and pixel of chord length.
const ARC_LIFT: f32 = 0.5;

const GRATICULE_STEP_DEG: i32 = 30;

/// Renders a composited primitive list, back to front.
pub fn render_primitives(
    painter: &Painter,
    layers: &[Rc<Primitive>],
    projection: &MapProjection,
    theme: Theme,
) {
    for primitive in layers {
        match &primitive.body {
            PrimitiveBody::BaseTiles(_) => render_base(painter, projection, theme),
            PrimitiveBody::Background(fill) => {
                painter.circle_filled(
                    projection.screen_rect.center(),
                    projection.globe_radius_px() as f32,
                    fill.color,
                );
            }
            PrimitiveBody::Paths(paths) => render_paths(painter, paths, projection),
            PrimitiveBody::Arcs(arcs) => render_arcs(painter, arcs, projection),
            PrimitiveBody::Markers(markers) => render_markers(painter, markers, projection),
            PrimitiveBody::Labels(labels) => render_labels(painter, labels, projection),
        }
    }
}

/// Base map stand-in: canvas fill plus a graticule.
fn render_base(painter: &Painter, projection: &MapProjection, theme: Theme) {
    let (fill, grid) = match theme {
        Theme::Light => (Color32::from_rgb(236, 238, 242), Color32::from_rgb(200, 205, 215)),
        Theme::Dark => (Color32::from_rgb(20, 20, 35), Color32::from_rgb(50, 55, 75)),
    };
    painter.rect_filled(projection.screen_rect, 0.0, fill);

    let stroke = Stroke::new(0.5, grid);
    for lon in (-180..=180).step_by(GRATICULE_STEP_DEG as usize) {
        let coords: Vec<Coord<f64>> = (-80..=80)
            .step_by(5)
            .map(|lat| Coord {
                x: lon as f64,
                y: lat as f64,
            })
            .collect();
        draw_polyline(painter, &project_line(&coords, projection), stroke);
    }
    for lat in (-60..=60).step_by(GRATICULE_STEP_DEG as usize) {
        let coords: Vec<Coord<f64>> = (-180..=180)
            .step_by(5)
            .map(|lon| Coord {
                x: lon as f64,
                y: lat as f64,
            })
            .collect();
        draw_polyline(painter, &project_line(&coords, projection), stroke);
    }
}

fn render_paths(painter: &Painter, paths: &PathPrimitive, projection: &MapProjection) {
    for path in &paths.paths {
        let color = if paths.is_highlighted(path) {
            paths.highlight_color
        } else {
            paths.color
        };
        let runs = project_line(&path.coords, projection);
        draw_polyline(painter, &runs, Stroke::new(paths.width, color));
    }
}

fn render_arcs(painter: &Painter, arcs: &ArcPrimitive, projection: &MapProjection) {
    for row in &arcs.rows {
        let color = if arcs.is_highlighted(row) {
            arcs.highlight_color
        } else {
            arcs.color
        };
        let stroke = Stroke::new(arcs.width, color);
        for span in &row.spans {
            draw_polyline(painter, &arc_runs(span, arcs.elevation, projection), stroke);
        }
    }
}

fn render_markers(painter: &Painter, markers: &MarkerPrimitive, projection: &MapProjection) {
    for marker in &markers.markers {
        let Some(pos) = projection.geo_to_screen(marker.coord) else {
            continue;
        };
        painter.circle_filled(pos, marker.radius, marker.fill);
        painter.circle_stroke(pos, marker.radius, Stroke::new(1.5, marker.line));
    }
}

/// Draws labels greedily by priority, skipping any that would overlap.
fn render_labels(painter: &Painter, labels: &LabelPrimitive, projection: &MapProjection) {
    let mut order: Vec<usize> = (0..labels.labels.len()).collect();
    order.sort_by(|a, b| {
        labels.labels[*b]
            .priority
            .total_cmp(&labels.labels[*a].priority)
    });

    let mut placed: Vec<Rect> = Vec::new();
    for i in order {
        let label = &labels.labels[i];
        let Some(pos) = projection.geo_to_screen(label.coord) else {
            continue;
        };
        let galley = painter.layout_no_wrap(
            label.text.clone(),
            FontId::proportional(labels.size),
            label.color,
        );
        let rect = Rect::from_min_size(pos + Vec2::new(6.0, -6.0 - galley.size().y), galley.size());
        if placed.iter().any(|r| r.intersects(rect)) {
            continue;
        }
        placed.push(rect);
        painter.galley(rect.min, galley, label.color);
    }
}

/// Projects a polyline, splitting it where points leave the visible globe.
fn project_line(coords: &[Coord<f64>], projection: &MapProjection) -> Vec<Vec<Pos2>> {
    let mut runs = Vec::new();
    let mut run: Vec<Pos2> = Vec::new();
    let mut last: Option<Coord<f64>> = None;
    for coord in coords {
        // Break flat lines that wrap across the antimeridian
        let wraps = projection.mode == ProjectionMode::Flat
            && last.is_some_and(|l| (l.x - coord.x).abs() > 180.0);
        match projection.geo_to_screen(*coord) {
            Some(pos) if !wraps => run.push(pos),
            Some(pos) => {
                runs.push(std::mem::take(&mut run));
                run.push(pos);
            }
            None => runs.push(std::mem::take(&mut run)),
        }
        last = Some(*coord);
    }
    runs.push(run);
    runs.retain(|r| r.len() >= 2);
    runs
}

/// Great-circle samples between two coordinates.
fn great_circle(span: &ArcSpan) -> Vec<Coord<f64>> {
    let a = unit_vector(span.source);
    let b = unit_vector(span.target);
    let theta = a.angle_between(b);
    (0..=ARC_SAMPLES)
        .map(|i| {
            let t = i as f64 / ARC_SAMPLES as f64;
            let v = if theta < 1e-9 {
                a.lerp(b, t)
            } else {
                (a * ((1.0 - t) * theta).sin() + b * (t * theta).sin()) / theta.sin()
            };
            from_unit_vector(v)
        })
        .collect()
}

/// Screen polylines of an arc, lifted by its elevation.
fn arc_runs(span: &ArcSpan, elevation: f32, projection: &MapProjection) -> Vec<Vec<Pos2>> {
    let mut runs = project_line(&great_circle(span), projection);
    if elevation <= 0.0 {
        return runs;
    }
    for run in &mut runs {
        let (Some(first), Some(last)) = (run.first().copied(), run.last().copied()) else {
            continue;
        };
        let chord = (last - first).length();
        let n = (run.len() - 1).max(1) as f32;
        for (i, p) in run.iter_mut().enumerate() {
            let t = i as f32 / n;
            p.y -= elevation * ARC_LIFT * chord * (PI * t).sin();
        }
    }
    runs
}

fn draw_polyline(painter: &Painter, runs: &[Vec<Pos2>], stroke: Stroke) {
    for run in runs {
        painter.line(run.clone(), stroke);
    }
}

/// Distance from `p` to the segment `a`-`b`.
fn segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

fn runs_hit(runs: &[Vec<Pos2>], pos: Pos2, radius: f32) -> bool {
    runs.iter()
        .flat_map(|run| run.windows(2))
        .any(|w| segment_distance(pos, w[0], w[1]) <= radius)
}

/// Object hit within one primitive: its index and any color it was given.
struct ObjectHit {
    index: usize,
    supplied: Option<Rgb>,
}

fn hit_object(primitive: &Primitive, projection: &MapProjection, pos: Pos2) -> Option<ObjectHit> {
    match &primitive.body {
        PrimitiveBody::Markers(m) if m.pickable => {
            m.markers.iter().enumerate().rev().find_map(|(index, marker)| {
                let center = projection.geo_to_screen(marker.coord)?;
                ((center - pos).length() <= marker.radius + PICK_SLOP).then_some(ObjectHit {
                    index,
                    supplied: marker.pick_color,
                })
            })
        }
        PrimitiveBody::Paths(p) if p.pickable => {
            p.paths.iter().enumerate().rev().find_map(|(index, path)| {
                let runs = project_line(&path.coords, projection);
                runs_hit(&runs, pos, p.width / 2.0 + PICK_SLOP).then_some(ObjectHit {
                    index,
                    supplied: path.pick_color,
                })
            })
        }
        PrimitiveBody::Arcs(a) if a.pickable => {
            a.rows.iter().enumerate().rev().find_map(|(index, row)| {
                row.spans
                    .iter()
                    .any(|span| {
                        let runs = arc_runs(span, a.elevation, projection);
                        runs_hit(&runs, pos, a.width / 2.0 + PICK_SLOP)
                    })
                    .then_some(ObjectHit {
                        index,
                        supplied: None,
                    })
            })
        }
        _ => None,
    }
}

/// Topmost pickable primitive under `pos`, with its picking color.
///
/// Kinds that accept custom pick encoding report the color they were given
/// (an object without one is not pickable); the others report the color
/// they allocate internally from the object index.
pub fn pick_primitives(
    layers: &[Rc<Primitive>],
    projection: &MapProjection,
    pos: Pos2,
) -> Option<PickHit> {
    for primitive in layers.iter().rev() {
        let Some(hit) = hit_object(primitive, projection, pos) else {
            continue;
        };
        let color = if primitive.supports_custom_pick_encoding() {
            hit.supplied
        } else {
            Some(ArcPrimitive::internal_pick_color(hit.index))
        };
        if let Some(color) = color {
            return Some(PickHit {
                primitive: primitive.id.clone(),
                color,
            });
        }
    }
    None
}
