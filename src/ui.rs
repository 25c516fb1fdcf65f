// src/ui.rs
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};

use crate::gesture::GestureEvent;
use crate::session::ChannelReport;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub secondary: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            secondary: Color32::from_rgb(255, 152, 0),
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

impl Theme {
    pub fn gesture_color(&self, gesture: GestureEvent) -> Color32 {
        match gesture {
            GestureEvent::Pinch => self.secondary,
            GestureEvent::Fist => self.error,
            GestureEvent::Open => self.success,
            GestureEvent::None => self.text_secondary,
        }
    }
}

pub struct UIComponents {
    pub theme: Theme,
}

impl Default for UIComponents {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
        }
    }
}

impl UIComponents {
    /// Ring showing the channel level, gesture label in the middle.
    pub fn draw_gesture_indicator(&self, ui: &mut egui::Ui, label: &str, report: &ChannelReport) {
        let size = ui.available_width().min(220.0);
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(size), egui::Sense::hover());
        let center = rect.center();
        let radius = size * 0.45;

        let painter = ui.painter();
        painter.circle_filled(center, radius, self.theme.surface);

        let color = if report.state.locked {
            self.theme.error
        } else {
            self.theme.primary
        };
        let level = report.state.current_value as f32 / 100.0;
        let start = -std::f32::consts::FRAC_PI_2;
        draw_arc(
            painter,
            center,
            radius * 0.9,
            start,
            start + level * std::f32::consts::TAU,
            color,
            6.0,
        );

        painter.text(
            Pos2::new(center.x, center.y - radius * 0.25),
            egui::Align2::CENTER_CENTER,
            label,
            egui::FontId::proportional(16.0),
            self.theme.text_secondary,
        );
        painter.text(
            center,
            egui::Align2::CENTER_CENTER,
            report.state.current_value.to_string(),
            egui::FontId::proportional(32.0),
            self.theme.text_primary,
        );
        painter.text(
            Pos2::new(center.x, center.y + radius * 0.4),
            egui::Align2::CENTER_CENTER,
            report.gesture.as_str().to_uppercase(),
            egui::FontId::proportional(14.0),
            self.theme.gesture_color(report.gesture),
        );
    }

    pub fn draw_level_bar(&self, ui: &mut egui::Ui, label: &str, value: u8, locked: bool) {
        ui.horizontal(|ui| {
            ui.label(label);

            let bar_width = 200.0;
            let bar_height = 20.0;
            let rect = ui.allocate_space(Vec2::new(bar_width, bar_height)).1;

            let painter = ui.painter();
            painter.rect_filled(rect, egui::Rounding::same(4.0), self.theme.surface);

            let fill_rect = Rect::from_min_size(
                rect.min,
                Vec2::new(bar_width * value as f32 / 100.0, bar_height),
            );
            let color = if locked {
                self.theme.error
            } else {
                self.theme.primary
            };
            painter.rect_filled(fill_rect, egui::Rounding::same(4.0), color);

            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                format!("{}%", value),
                egui::FontId::proportional(12.0),
                self.theme.text_primary,
            );
        });
    }

    pub fn draw_lock_badge(&self, ui: &mut egui::Ui, locked: bool) {
        let (text, color) = if locked {
            ("🔒 Locked", self.theme.error)
        } else {
            ("🔓 Unlocked", self.theme.success)
        };
        ui.label(egui::RichText::new(text).color(color).strong());
    }

    /// Feature anchors and pinch segments, scaled from frame pixels into
    /// the allocated area.
    pub fn draw_hand_overlay(
        &self,
        ui: &mut egui::Ui,
        frame_size: (u32, u32),
        reports: &[(&ChannelReport, Color32)],
    ) {
        let width = ui.available_width();
        let aspect = if frame_size.0 > 0 {
            frame_size.1 as f32 / frame_size.0 as f32
        } else {
            0.75
        };
        let (rect, _) =
            ui.allocate_exact_size(Vec2::new(width, width * aspect), egui::Sense::hover());
        let painter = ui.painter();
        painter.rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));

        let to_screen = |x: f64, y: f64| {
            let fw = frame_size.0.max(1) as f32;
            let fh = frame_size.1.max(1) as f32;
            Pos2::new(
                rect.left() + x as f32 / fw * rect.width(),
                rect.top() + y as f32 / fh * rect.height(),
            )
        };

        let mut drawn = false;
        for (report, color) in reports {
            let Some(feature) = report.feature.as_ref() else {
                continue;
            };
            if let Some((a, b)) = feature.span {
                painter.line_segment(
                    [to_screen(a.x, a.y), to_screen(b.x, b.y)],
                    Stroke::new(3.0, *color),
                );
                painter.circle_filled(to_screen(a.x, a.y), 6.0, *color);
                painter.circle_filled(to_screen(b.x, b.y), 6.0, *color);
            }
            let anchor = to_screen(feature.anchor.x, feature.anchor.y);
            painter.circle_filled(anchor, 8.0, *color);
            painter.circle_stroke(anchor, 10.0, Stroke::new(2.0, self.theme.text_primary));
            drawn = true;
        }

        if !drawn {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No Hands Detected",
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
        }
    }
}

fn draw_arc(
    painter: &egui::Painter,
    center: Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
    color: Color32,
    thickness: f32,
) {
    let points_count = ((end_angle - start_angle).abs() * 50.0) as usize;
    if points_count == 0 {
        return;
    }

    let points: Vec<Pos2> = (0..=points_count)
        .map(|i| {
            let t = i as f32 / points_count as f32;
            let angle = start_angle + (end_angle - start_angle) * t;
            Pos2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();

    for pair in points.windows(2) {
        painter.line_segment([pair[0], pair[1]], Stroke::new(thickness, color));
    }
}
