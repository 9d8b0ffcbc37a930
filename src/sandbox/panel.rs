use egui::epaint::Shadow;

use super::arena::FloorConfig;
use super::session::Command;
use super::tuning::{SLIDERS, TuningSnapshot};
use crate::engine::components::WalkerId;

/// One walker's name tag, already projected to egui screen points.
pub struct NameTag {
    /// Point just above the walker's head.
    pub pos: egui::Pos2,
    pub text: String,
    pub selected: bool,
}

/// Read-only state the panel shows for one frame.
pub struct PanelView<'a> {
    pub tuning: TuningSnapshot,
    pub floors: &'a [FloorConfig],
    pub active_floor: Option<usize>,
    /// `(id, name)` in spawn order.
    pub walkers: Vec<(WalkerId, String)>,
    pub selected: Option<WalkerId>,
    pub pending_loads: usize,
    pub follow: bool,
    pub fps: u32,
}

/// Panel state that outlives a frame: the rename draft.
#[derive(Debug, Default)]
pub struct PanelEdit {
    rename_for: Option<WalkerId>,
    pub rename_text: String,
}

impl PanelEdit {
    /// Reset the draft to the selected walker's current name when the
    /// selection changes.
    pub fn sync(&mut self, view: &PanelView<'_>) {
        if self.rename_for == view.selected {
            return;
        }
        self.rename_for = view.selected;
        self.rename_text = view
            .selected
            .and_then(|id| view.walkers.iter().find(|(wid, _)| *wid == id))
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
    }
}

/// Lay out the tuning, spawn, floor and rename panels and collect the
/// commands the user issued this frame.
pub fn draw_panels(ctx: &egui::Context, view: &PanelView<'_>, edit: &mut PanelEdit) -> Vec<Command> {
    let mut commands = Vec::new();
    edit.sync(view);

    egui::Window::new("Tuning")
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            let mut tuning = view.tuning;
            let mut changed = false;
            for (field, label, range) in SLIDERS.iter() {
                changed |= ui
                    .add(egui::Slider::new(tuning.field_mut(*field), range.clone()).text(*label))
                    .changed();
            }
            changed |= ui.checkbox(&mut tuning.paused, "Paused (P)").changed();
            if ui.button("Reset").clicked() {
                tuning = TuningSnapshot { paused: tuning.paused, ..TuningSnapshot::default() };
                changed = true;
            }
            if changed {
                commands.push(Command::Retune(tuning));
            }
        });

    egui::Window::new("Walkers")
        .anchor(egui::Align2::LEFT_BOTTOM, [10.0, -10.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Spawn walker (Space)").clicked() {
                    commands.push(Command::Spawn);
                }
                if view.pending_loads > 0 {
                    ui.label(format!("loading {}…", view.pending_loads));
                }
            });

            let selected_name = view
                .selected
                .and_then(|id| view.walkers.iter().find(|(wid, _)| *wid == id))
                .map_or("none".to_string(), |(id, name)| format!("{name} {id}"));
            let mut choice = view.selected;
            egui::ComboBox::from_label("Selected")
                .selected_text(selected_name)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut choice, None, "none");
                    for (id, name) in &view.walkers {
                        ui.selectable_value(&mut choice, Some(*id), format!("{name} {id}"));
                    }
                });
            if choice != view.selected {
                commands.push(Command::Select(choice));
            }

            if let Some(id) = view.selected {
                ui.horizontal(|ui| {
                    let response = ui.text_edit_singleline(&mut edit.rename_text);
                    let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if ui.button("Rename").clicked() || submitted {
                        let name = edit.rename_text.trim();
                        if !name.is_empty() {
                            commands.push(Command::Rename { id, name: name.to_string() });
                        }
                    }
                });
            }
        });

    if !view.floors.is_empty() {
        egui::Window::new("Floor")
            .anchor(egui::Align2::RIGHT_BOTTOM, [-10.0, -10.0])
            .resizable(false)
            .show(ctx, |ui| {
                let mut choice = view.active_floor;
                let current = view.active_floor.and_then(|i| view.floors.get(i)).map_or("default", |f| f.name.as_str());
                egui::ComboBox::from_label("Floor").selected_text(current).show_ui(ui, |ui| {
                    for (idx, floor) in view.floors.iter().enumerate() {
                        ui.selectable_value(&mut choice, Some(idx), format!("{} ({})", floor.name, idx + 1));
                    }
                });
                if let (Some(idx), true) = (choice, choice != view.active_floor) {
                    commands.push(Command::SelectFloor(idx));
                }
            });
    }

    egui::Area::new(egui::Id::new("instructions"))
        .fixed_pos(egui::pos2(10.0, 10.0))
        .show(ctx, |ui| {
            egui::Frame::none()
                .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                .inner_margin(egui::Margin::same(8.0))
                .rounding(4.0)
                .show(ui, |ui: &mut egui::Ui| {
                    ui.label(format!("FPS: {}  Walkers: {}", view.fps, view.walkers.len()));
                    ui.label("Click a walker to select it");
                    ui.label(format!("F: follow ({})", if view.follow { "on" } else { "off" }));
                    ui.label("Esc: deselect   Tab: next walker");
                    ui.label("WASD pan, Q/E orbit, wheel zoom");
                    ui.label("1-9: floor   O: obstacles");
                });
        });

    commands
}

fn draw_name_tags(ctx: &egui::Context, tags: &[NameTag]) {
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Background, egui::Id::new("name_tags")));
    let font = egui::FontId::proportional(14.0);
    for tag in tags {
        let color = if tag.selected {
            egui::Color32::from_rgb(0, 229, 255)
        } else {
            egui::Color32::WHITE
        };
        painter.text(tag.pos + egui::vec2(1.0, 1.0), egui::Align2::CENTER_BOTTOM, &tag.text, font.clone(), egui::Color32::BLACK);
        painter.text(tag.pos, egui::Align2::CENTER_BOTTOM, &tag.text, font.clone(), color);
    }
}

pub struct Panel {
    pub visible: bool,
    pub edit: PanelEdit,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Panel {
    pub fn new(window: &winit::window::Window, device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let egui_ctx = egui::Context::default();

        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        // Drawn after the scene pass, so no depth.
        let egui_renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self { visible: true, edit: PanelEdit::default(), egui_ctx, egui_state, egui_renderer }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// True while a text field has focus; hotkeys should be ignored.
    pub fn wants_keyboard(&self) -> bool {
        self.egui_ctx.wants_keyboard_input()
    }

    /// True while the cursor is over a panel; clicks should not pick walkers.
    pub fn wants_pointer(&self) -> bool {
        self.egui_ctx.is_pointer_over_area() || self.egui_ctx.wants_pointer_input()
    }

    /// Run and paint one egui frame on top of `view`. Returns the commands
    /// the user issued.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        target: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        view: &PanelView<'_>,
        tags: &[NameTag],
    ) -> Vec<Command> {
        let raw_input = self.egui_state.take_egui_input(window);

        let mut commands = Vec::new();
        let visible = self.visible;
        let edit = &mut self.edit;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            draw_name_tags(ctx, tags);
            if visible {
                commands = draw_panels(ctx, view, edit);
            }
        });

        self.egui_state.handle_platform_output(window, full_output.platform_output);

        let tris = self.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer.update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer.render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        commands
    }
}
