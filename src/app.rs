// src/app.rs
use std::time::Duration;

use eframe::egui;
use tokio::sync::watch;

use crate::session::{Channel, ControlOutput};
use crate::strategy::Strategy;
use crate::ui::UIComponents;

/// Read-only status window. Values arrive from the frame driver; the app
/// never touches the session.
pub struct GestureControlApp {
    receiver: watch::Receiver<Option<ControlOutput>>,
    strategy: Strategy,
    ui_components: UIComponents,
    show_about: bool,
}

impl GestureControlApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        receiver: watch::Receiver<Option<ControlOutput>>,
        strategy: Strategy,
    ) -> Self {
        cc.egui_ctx.set_visuals(create_visuals());
        Self {
            receiver,
            strategy,
            ui_components: UIComponents::default(),
            show_about: false,
        }
    }

    fn render_header(&mut self, ctx: &egui::Context, latest: Option<&ControlOutput>) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Gesture Control");
                ui.separator();
                ui.label(format!("Strategy: {}", self.strategy));
                if let Some(out) = latest {
                    ui.separator();
                    ui.label(format!("Frame {}", out.frame));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("ℹ About").clicked() {
                        self.show_about = !self.show_about;
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_channels(&self, ctx: &egui::Context, latest: Option<&ControlOutput>) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(out) = latest else {
                ui.centered_and_justified(|ui| {
                    ui.label("Waiting for frames...");
                });
                return;
            };

            ui.columns(2, |columns| {
                for (column, channel) in columns.iter_mut().zip(Channel::ALL) {
                    let report = out.channel(channel);
                    let label = match channel {
                        Channel::Brightness => "Brightness",
                        Channel::Volume => "Volume",
                    };
                    column.vertical_centered(|ui| {
                        self.ui_components.draw_gesture_indicator(ui, label, report);
                        ui.add_space(8.0);
                        self.ui_components.draw_lock_badge(ui, report.state.locked);
                        if !report.observed {
                            ui.colored_label(egui::Color32::GRAY, "No hand");
                        }
                    });
                }
            });

            ui.add_space(16.0);
            ui.separator();
            let theme = &self.ui_components.theme;
            self.ui_components.draw_hand_overlay(
                ui,
                (out.width, out.height),
                &[
                    (&out.brightness, theme.primary),
                    (&out.volume, theme.secondary),
                ],
            );
        });
    }

    fn render_status_bar(&self, ctx: &egui::Context, latest: Option<&ControlOutput>) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| match latest {
                Some(out) => {
                    self.ui_components.draw_level_bar(
                        ui,
                        "Brightness",
                        out.brightness.state.current_value,
                        out.brightness.state.locked,
                    );
                    ui.separator();
                    self.ui_components.draw_level_bar(
                        ui,
                        "Volume",
                        out.volume.state.current_value,
                        out.volume.state.locked,
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let color = if out.lock_flags() == (false, false) {
                            self.ui_components.theme.success
                        } else {
                            self.ui_components.theme.warning
                        };
                        ui.label(egui::RichText::new(out.status()).color(color).strong());
                    });
                }
                None => {
                    ui.label("Ready");
                }
            });
            ui.add_space(6.0);
        });
    }

    fn render_about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("About")
            .open(&mut self.show_about)
            .resizable(false)
            .default_size([360.0, 220.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("Gesture Control");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(12.0);
                    ui.label("Pinch: toggle the channel lock.");
                    ui.label("Fist: hold the channel while closed.");
                    ui.label("Open hand: move to adjust.");
                });
            });
    }
}

impl eframe::App for GestureControlApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let latest = self.receiver.borrow().clone();

        self.render_header(ctx, latest.as_ref());
        self.render_status_bar(ctx, latest.as_ref());
        self.render_channels(ctx, latest.as_ref());
        if self.show_about {
            self.render_about_window(ctx);
        }

        ctx.request_repaint_after(Duration::from_millis(30));
    }
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(70, 130, 240);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);
    visuals.window_rounding = egui::Rounding::same(12.0);

    visuals
}
