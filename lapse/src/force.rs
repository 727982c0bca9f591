//! Force layout for projection labels
//!
//! Every label is pulled back toward its anchor (the true projected
//! coordinate) and pushed out of overlapping boxes. The anchor pull grows
//! with distance from the pointer, so labels near the cursor spread out
//! while distant ones snap home.
//!
//! `advance` is a pure step over an immutable snapshot; the caller owns the
//! loop. `ForceSimulation` is a small driver for callers that just want one.
//!
//! Cooling follows the usual alpha schedule: alpha decays geometrically from
//! 1 toward 0 and the anchor pull is scaled by it. Collision is not scaled,
//! so overlaps keep resolving as the layout cools.

use serde::Serialize;

use crate::geometry::{distance, Point};
use crate::layout::PlacedLabel;
use crate::text::TextMeasure;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceNode {
    pub label: String,
    /// Where the node wants to be
    pub anchor: Point,
    pub position: Point,
    pub velocity: Point,
    pub width: f64,
    pub height: f64,
}

impl ForceNode {
    /// A node at rest on its anchor
    pub fn new(label: impl Into<String>, anchor: Point, width: f64, height: f64) -> Self {
        Self {
            label: label.into(),
            anchor,
            position: anchor,
            velocity: Point::ZERO,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

/// Simulation snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceState {
    pub nodes: Vec<ForceNode>,
    pub alpha: f64,
    /// Steps since the last (re)heat
    pub ticks: u32,
}

impl ForceState {
    pub fn new(nodes: Vec<ForceNode>) -> Self {
        Self {
            nodes,
            alpha: 1.0,
            ticks: 0,
        }
    }

    pub fn positions(&self) -> Vec<Point> {
        self.nodes.iter().map(|n| n.position).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceParams {
    pub alpha_min: f64,
    /// Fraction of alpha lost per tick
    pub alpha_decay: f64,
    /// Fraction of velocity lost per tick
    pub velocity_decay: f64,
    /// Anchor pull far from the pointer (or with no pointer)
    pub anchor_strength: f64,
    /// Anchor pull right under the pointer
    pub anchor_strength_near: f64,
    pub pointer: Option<Point>,
    /// Beyond this distance the pointer has no effect
    pub pointer_radius: f64,
    pub collide_strength: f64,
    /// Extra gap kept between boxes
    pub padding: f64,
    /// Below this total kinetic energy the layout counts as settled
    pub energy_threshold: f64,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            alpha_min: 0.001,
            // reach alpha_min in ~300 ticks
            alpha_decay: 1.0 - 0.001f64.powf(1.0 / 300.0),
            velocity_decay: 0.4,
            anchor_strength: 0.1,
            anchor_strength_near: 0.005,
            pointer: None,
            pointer_radius: 100.0,
            collide_strength: 0.7,
            padding: 1.0,
            energy_threshold: 1e-3,
        }
    }
}

impl ForceParams {
    /// Anchor pull for a node currently at `position`
    pub fn anchor_strength_at(&self, position: Point) -> f64 {
        let Some(pointer) = self.pointer else {
            return self.anchor_strength;
        };
        if !(self.pointer_radius > 0.0) {
            return self.anchor_strength;
        }
        let t = (distance(position, pointer) / self.pointer_radius).clamp(0.0, 1.0);
        self.anchor_strength_near * (1.0 - t) + self.anchor_strength * t
    }
}

/// Push needed to separate boxes `a` and `b`, applied as `-push` to `a` and
/// `+push` to `b`. Zero when they do not overlap.
fn separation(a: &ForceNode, b: &ForceNode, padding: f64) -> Point {
    let dx = b.position.x - a.position.x;
    let dy = b.position.y - a.position.y;
    let overlap_x = (a.width + b.width) / 2.0 + padding - dx.abs();
    let overlap_y = (a.height + b.height) / 2.0 + padding - dy.abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return Point::ZERO;
    }

    // coincident centres separate by index order: a left/up, b right/down
    let sign = |d: f64| if d < 0.0 { -1.0 } else { 1.0 };
    if overlap_x <= overlap_y {
        Point::new(sign(dx) * overlap_x / 2.0, 0.0)
    } else {
        Point::new(0.0, sign(dy) * overlap_y / 2.0)
    }
}

/// One simulation step of `dt` ticks. Pure: the input is left untouched.
pub fn advance(state: &ForceState, params: &ForceParams, dt: f64) -> ForceState {
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    let alpha = state.alpha;

    let mut velocities: Vec<Point> = state
        .nodes
        .iter()
        .map(|node| {
            let pull = params.anchor_strength_at(node.position) * alpha * dt;
            node.velocity.add(node.position.to(node.anchor).scale(pull, pull))
        })
        .collect();

    let strength = params.collide_strength * dt;
    for i in 0..state.nodes.len() {
        for j in (i + 1)..state.nodes.len() {
            let push = separation(&state.nodes[i], &state.nodes[j], params.padding)
                .scale(strength, strength);
            if push.is_zero() {
                continue;
            }
            velocities[i] = velocities[i].add(push.scale(-1.0, -1.0));
            velocities[j] = velocities[j].add(push);
        }
    }

    let keep = (1.0 - params.velocity_decay).clamp(0.0, 1.0).powf(dt);
    let nodes = state
        .nodes
        .iter()
        .zip(velocities)
        .map(|(node, velocity)| {
            let velocity = velocity.scale(keep, keep);
            ForceNode {
                position: node.position.add(velocity.scale(dt, dt)),
                velocity,
                ..node.clone()
            }
        })
        .collect();

    ForceState {
        nodes,
        alpha: alpha * (1.0 - params.alpha_decay).clamp(0.0, 1.0).powf(dt),
        ticks: state.ticks.saturating_add(1),
    }
}

pub fn kinetic_energy(state: &ForceState) -> f64 {
    state
        .nodes
        .iter()
        .map(|n| 0.5 * (n.velocity.x * n.velocity.x + n.velocity.y * n.velocity.y))
        .sum()
}

/// Cooled out, or at least one step taken and barely moving.
pub fn is_settled(state: &ForceState, params: &ForceParams) -> bool {
    state.alpha < params.alpha_min
        || (state.ticks > 0 && kinetic_energy(state) < params.energy_threshold)
}

/// Restart the cooling schedule, keeping positions and velocities.
pub fn reheat(state: &ForceState) -> ForceState {
    ForceState {
        nodes: state.nodes.clone(),
        alpha: 1.0,
        ticks: 0,
    }
}

/// Nodes for projection labels, sized by measured text
pub fn label_nodes<M>(labels: &[PlacedLabel], font_size: f64, measure: &M) -> Vec<ForceNode>
where
    M: TextMeasure + ?Sized,
{
    labels
        .iter()
        .map(|label| {
            let width = measure.measure_text(&label.text, font_size);
            ForceNode::new(label.text.clone(), label.position, width, font_size)
        })
        .collect()
}

/// Caller-owned loop around `advance`
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    state: ForceState,
    params: ForceParams,
}

impl ForceSimulation {
    pub fn new(nodes: Vec<ForceNode>, params: ForceParams) -> Self {
        Self {
            state: ForceState::new(nodes),
            params,
        }
    }

    pub fn state(&self) -> &ForceState {
        &self.state
    }

    pub fn params(&self) -> &ForceParams {
        &self.params
    }

    pub fn is_settled(&self) -> bool {
        is_settled(&self.state, &self.params)
    }

    /// Advance one tick. Returns false once settled.
    pub fn tick(&mut self) -> bool {
        if self.is_settled() {
            return false;
        }
        self.state = advance(&self.state, &self.params, 1.0);
        !self.is_settled()
    }

    /// Tick until settled or `max_ticks` is hit. Returns the ticks taken.
    pub fn run(&mut self, max_ticks: u32) -> u32 {
        let mut taken = 0;
        while taken < max_ticks && !self.is_settled() {
            self.state = advance(&self.state, &self.params, 1.0);
            taken += 1;
        }
        taken
    }

    /// Move the pointer. Any change reheats the layout.
    pub fn set_pointer(&mut self, pointer: Option<Point>) {
        if self.params.pointer == pointer {
            return;
        }
        self.params.pointer = pointer;
        self.state = reheat(&self.state);
    }
}
