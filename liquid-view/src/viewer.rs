//! Interactive 2D liquid viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the simulation ([`Liquid`]),
//! the obstacle world and the camera, and implements [`eframe::App`] to
//! render and control the simulation through an egui UI.

use eframe::App;
use glam::Vec2;
use liquid_core::{
    Config, FrameStats, Liquid, Result, Shape, StaticWorld, aabb::Aabb, scene::demo_world,
};

/// Main application state for the interactive viewer.
///
/// The typical per-frame update is:
/// 1. Handle UI interactions / input (pan, zoom, spawn, magnet placement).
/// 2. If `running` is `true` and enough time has passed, call [`Viewer::step_once`].
/// 3. Render fixtures, particles and magnets.
///
/// ### Fields
/// - `liquid` - The simulation.
/// - `world` - Static obstacles the liquid collides with.
/// - `cfg` - Edited copy of the config; applied by rebuilding the liquid.
/// - `seed` - Spawn seed reused on every rebuild, if any.
///
/// - `running` - Whether the simulation is currently auto-advancing.
/// - `zoom` - Pixels per world unit.
/// - `pan` - Screen-space pan offset in pixels.
///
/// - `pointer` - Last known pointer position in world space.
/// - `place_magnet` - A magnet placement requested for the next step.
/// - `burst` - Particles spawned per left click.
/// - `last_stats` - Stats of the most recent frame.
///
/// - `step_interval` - Target time between automatic steps (seconds).
/// - `last_step_time` - Time stamp of the last step (egui time).
/// - `last_step_dt` - Actual time delta between the last two steps.
pub struct Viewer {
    liquid: Liquid,
    world: StaticWorld,
    cfg: Config,
    seed: Option<u64>,

    running: bool,
    zoom: f32,
    pan: egui::Vec2,

    pointer: Vec2,
    place_magnet: bool,
    burst: usize,
    last_stats: FrameStats,

    step_interval: f64,
    last_step_time: f64,
    last_step_dt: f64,
}

impl Viewer {
    /// Creates a viewer over the demo obstacle course.
    ///
    /// ### Errors
    /// Fails if `cfg` is rejected or the worker pool cannot start.
    pub fn new(cfg: Config, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            liquid: Self::build_liquid(cfg, seed)?,
            world: demo_world(),
            cfg,
            seed,
            running: false,
            zoom: 20.0,
            pan: egui::vec2(0.0, 0.0),
            pointer: Vec2::new(0.0, 20.0),
            place_magnet: false,
            burst: 20,
            last_stats: FrameStats::default(),
            step_interval: 1.0 / 60.0,
            last_step_time: 0.0,
            last_step_dt: 0.0,
        })
    }

    fn build_liquid(cfg: Config, seed: Option<u64>) -> Result<Liquid> {
        match seed {
            Some(seed) => Liquid::with_seed(cfg, seed),
            None => Liquid::new(cfg),
        }
    }

    /// Removes all particles and placed magnets and stops auto-running.
    fn reset(&mut self) {
        self.liquid.reset();
        self.last_stats = FrameStats::default();
        self.place_magnet = false;
        self.running = false;
    }

    /// Rebuilds the liquid with the edited config. Keeps the old one if the
    /// new config is rejected.
    fn apply_config(&mut self) {
        match Self::build_liquid(self.cfg, self.seed) {
            Ok(liquid) => {
                self.liquid = liquid;
                self.last_stats = FrameStats::default();
            }
            Err(e) => {
                tracing::warn!("config rejected: {e}");
                self.cfg = *self.liquid.config();
            }
        }
    }

    /// Advances the simulation by a single frame, consuming any pending
    /// magnet placement.
    fn step_once(&mut self) {
        let dt = self.liquid.config().dt;
        let place = std::mem::take(&mut self.place_magnet);
        self.last_stats = self.liquid.update(dt, self.pointer, place, &self.world);
    }

    /// Converts a world-space position to screen-space.
    ///
    /// World coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside the given `rect`. The y-axis is flipped so that
    /// positive y goes up in world space.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Inverse of [`Viewer::world_to_screen`].
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    fn labeled_drag_usize(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut usize,
        range: std::ops::RangeInclusive<usize>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (run controls, stepping, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                ui.add(
                    egui::DragValue::new(&mut self.step_interval)
                        .prefix("dt target = ")
                        .range(0.001..=1.0)
                        .speed(0.001),
                );

                if ui.button("Step").clicked() {
                    let now = ctx.input(|i| i.time);
                    if self.last_step_time > 0.0 {
                        self.last_step_dt = now - self.last_step_time;
                    }
                    self.step_once();
                    self.last_step_time = now;
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 1.0..=100.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (frame stats and timing).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        let stats = self.last_stats;
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("dt last = {:.3} s", self.last_step_dt));
                ui.separator();
                ui.label(format!("skipped contacts = {}", stats.skipped_collisions));
                ui.label(format!("dropped forces = {}", stats.dropped_force_tasks));
                ui.label(format!("collisions = {}", stats.collisions));
                ui.label(format!("candidates = {}", stats.candidates_assigned));
                ui.label(format!(
                    "particles = {} / {}",
                    self.liquid.particles().active_count(),
                    self.liquid.particles().capacity()
                ));
                ui.label(format!("magnets = {}", self.liquid.magnets().placed().len()));
                ui.label(format!("frame = {}", stats.frame));
            });
        });
    }

    /// Builds the right-hand panel for editing simulation constants.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Config");

                ui.separator();
                ui.label("Fluid");
                Self::labeled_drag_f32(ui, "rest_density:", &mut self.cfg.rest_density, 0.0..=50.0, 0.1);
                Self::labeled_drag_f32(ui, "viscosity:", &mut self.cfg.viscosity, 0.0..=1.0, 0.001);
                Self::labeled_drag_f32(ui, "gravity.y:", &mut self.cfg.gravity.y, -0.1..=0.1, 0.0005);
                Self::labeled_drag_usize(ui, "max_neighbors:", &mut self.cfg.max_neighbors, 1..=200, 1.0);

                ui.separator();
                ui.label("Collision");
                Self::labeled_drag_f32(ui, "skin:", &mut self.cfg.collision_skin, 0.0..=1.0, 0.01);
                Self::labeled_drag_f32(
                    ui,
                    "damping:",
                    &mut self.cfg.restitution_damping,
                    0.0..=2.0,
                    0.05,
                );

                ui.separator();
                ui.label("Spawning");
                Self::labeled_drag_usize(ui, "source_rate:", &mut self.cfg.source_rate, 0..=20, 1.0);
                Self::labeled_drag_usize(ui, "click burst:", &mut self.burst, 1..=500, 1.0);
                Self::labeled_drag_usize(
                    ui,
                    "max_particles:",
                    &mut self.cfg.max_particles,
                    1..=20_000,
                    10.0,
                );

                ui.separator();
                Self::labeled_drag_usize(ui, "worker_threads:", &mut self.cfg.worker_threads, 0..=64, 1.0);

                ui.separator();
                if ui.button("Apply (restarts)").clicked() {
                    self.apply_config();
                }
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = Config::default();
                }
            });
    }

    fn draw_world(&self, painter: &egui::Painter, rect: egui::Rect) {
        let stroke = egui::Stroke::new(1.5, egui::Color32::LIGHT_GRAY);
        for (_, fixture) in self.world.iter() {
            match &fixture.shape {
                Shape::Polygon { vertices } => {
                    let points: Vec<egui::Pos2> = vertices
                        .iter()
                        .map(|&v| self.world_to_screen(fixture.transform.apply(v), rect))
                        .collect();
                    painter.add(egui::Shape::closed_line(points, stroke));
                }
                Shape::Circle { center, radius } => {
                    let c = self.world_to_screen(fixture.transform.apply(*center), rect);
                    painter.circle_stroke(c, radius * self.zoom, stroke);
                }
            }
        }
    }

    fn draw_box(&self, painter: &egui::Painter, rect: egui::Rect, aabb: &Aabb, fill: Option<egui::Color32>) {
        let screen = egui::Rect::from_two_pos(
            self.world_to_screen(aabb.lower, rect),
            self.world_to_screen(aabb.upper, rect),
        );
        match fill {
            Some(color) => {
                painter.rect_filled(screen, 0.0, color);
            }
            None => {
                painter.rect_stroke(
                    screen,
                    0.0,
                    egui::Stroke::new(1.0, egui::Color32::YELLOW),
                    egui::StrokeKind::Middle,
                );
            }
        }
    }

    /// Builds the central panel where the scene is drawn and interacted with.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            if response.dragged() {
                self.pan += response.drag_delta();
            }

            if let Some(p) = response.hover_pos() {
                self.pointer = self.screen_to_world(p, rect);
            }

            // Left click pours particles, right click pins a magnet.
            if response.clicked() {
                self.liquid.spawn_particles(self.burst, self.pointer);
            }
            if response.secondary_clicked() {
                self.place_magnet = true;
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let world_before = self.screen_to_world(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(1.0, 100.0);

                let screen_after = self.world_to_screen(world_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            self.draw_world(&painter, rect);

            let r = (0.08 * self.zoom).max(1.5);
            for pos in self.liquid.particles().positions() {
                painter.circle_filled(self.world_to_screen(pos, rect), r, egui::Color32::LIGHT_BLUE);
            }

            let magnets = self.liquid.magnets();
            for magnet in magnets.placed() {
                self.draw_box(&painter, rect, &magnet.aabb(), Some(egui::Color32::from_rgb(200, 60, 60)));
            }
            self.draw_box(&painter, rect, &magnets.cursor().aabb(), None);

            if self.running {
                let now = ctx.input(|i| i.time);
                let elapsed = now - self.last_step_time;
                if elapsed >= self.step_interval {
                    if self.last_step_time > 0.0 {
                        self.last_step_dt = elapsed;
                    }
                    self.step_once();
                    self.last_step_time = now;
                }

                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}
