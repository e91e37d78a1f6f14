use std::error::Error;

use eframe::{App, CreationContext, Frame, Storage};
use egui::{
    pos2, vec2, Align2, CentralPanel, Color32, Context, FontId, Painter, Rect, Sense, Shape, Stroke,
    Ui, ViewportBuilder,
};
use egui_extras::{Column, TableBuilder};
use number_prefix::NumberPrefix;
use serde::{Deserialize, Serialize};

use crate::calc;
use crate::error::{LinkError, LinkResult};
use crate::params::Configuration;
use crate::surface::{self, Projection, SurfacePlot, ZScale};
use crate::sweep::GridSummary;

const VIEW_KEY: &str = "surface_view";
const COLORBAR_WIDTH: f32 = 90.0;
const TITLE_HEIGHT: f32 = 32.0;

/// Camera and scale of the surface, restored on the next launch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    azimuth: f32,   // degrees
    elevation: f32, // degrees
    z_scale: ZScale,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            azimuth: -60.0,
            elevation: 30.0,
            z_scale: ZScale::default(),
        }
    }
}

impl ViewState {
    pub fn rotate(&mut self, delta: egui::Vec2) {
        self.azimuth = (self.azimuth - delta.x * 0.4).rem_euclid(360.0);
        self.elevation = (self.elevation + delta.y * 0.4).clamp(-90.0, 90.0);
    }
}

pub struct SurfaceApp {
    plot: SurfacePlot,
    parameters: Vec<(&'static str, String)>,
    summary: GridSummary,
    view: ViewState,
}

impl SurfaceApp {
    pub fn new(
        cc: &CreationContext,
        plot: SurfacePlot,
        parameters: Vec<(&'static str, String)>,
    ) -> Result<Box<dyn App>, Box<dyn Error + Send + Sync>> {
        let view = cc
            .storage
            .and_then(|storage| eframe::get_value::<ViewState>(storage, VIEW_KEY))
            .unwrap_or_default();
        let summary = plot.grid().summary();
        Ok(Box::new(Self { plot, parameters, summary, view }))
    }

    fn ui_parameters(&self, ui: &mut Ui) {
        frame_styled(ui).show(ui, |ui| {
            ui.heading("Parameters");
            TableBuilder::new(ui)
                .id_salt("parameter_table")
                .striped(true)
                .column(Column::exact(140.0))
                .column(Column::remainder())
                .header(20., |mut header| {
                    header.col(|ui| {
                        ui.strong("Name");
                    });
                    header.col(|ui| {
                        ui.strong("Value");
                    });
                })
                .body(|mut body| {
                    for (name, value) in &self.parameters {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(*name);
                            });
                            row.col(|ui| {
                                ui.label(value.as_str());
                            });
                        });
                    }
                });
        });
    }

    fn ui_summary(&self, ui: &mut Ui) {
        frame_styled(ui).show(ui, |ui| {
            ui.heading("Result");
            egui::Grid::new("grid_summary").num_columns(2).show(ui, |ui| {
                let (rows, cols) = self.plot.grid().shape();
                ui.label("Cells");
                ui.label(format!("{rows} x {cols}"));
                ui.end_row();

                ui.label("BER min");
                ui.label(format!("{:.3e}", self.summary.min));
                ui.end_row();

                ui.label("BER max");
                ui.label(format!("{:.3e}", self.summary.max));
                ui.end_row();

                ui.label("BER mean");
                ui.label(format!("{:.3e}", self.summary.mean));
                ui.end_row();
            });
        });
    }

    fn ui_surface(&mut self, ui: &mut Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::drag());
        self.view.rotate(response.drag_delta());

        let text_color = ui.visuals().text_color();
        let full = response.rect;
        painter.text(
            pos2(full.center().x, full.top() + TITLE_HEIGHT / 2.0),
            Align2::CENTER_CENTER,
            surface::TITLE,
            FontId::proportional(18.0),
            text_color,
        );

        let plot_rect = Rect::from_min_max(
            pos2(full.left(), full.top() + TITLE_HEIGHT),
            pos2(full.right() - COLORBAR_WIDTH, full.bottom()),
        );
        let scale = plot_rect.width().min(plot_rect.height()) / 1.9;
        let camera = Projection::new(
            self.view.azimuth,
            self.view.elevation,
            plot_rect.center(),
            scale,
        );

        self.paint_axes(&painter, &camera, text_color);

        let edge = Stroke::new(0.4, Color32::from_black_alpha(170));
        let quads = surface::surface_quads(&self.plot, self.view.z_scale, &camera);
        if quads.is_empty() {
            // a single row or column has no faces, show the samples instead
            for row in surface::vertices(&self.plot, self.view.z_scale) {
                for p in row {
                    painter.circle_filled(camera.point(p), 3.0, surface::viridis(p[2] + 0.5));
                }
            }
        }
        painter.extend(quads.into_iter().map(|quad| {
            Shape::convex_polygon(quad.corners.to_vec(), surface::viridis(quad.level), edge)
        }));

        let bar_left = full.right() - COLORBAR_WIDTH;
        let bar_half = plot_rect.height() / 4.0;
        let bar = Rect::from_min_max(
            pos2(bar_left + 16.0, plot_rect.center().y - bar_half),
            pos2(bar_left + 32.0, plot_rect.center().y + bar_half),
        );
        self.paint_colorbar(&painter, bar, text_color);
    }

    fn paint_axes(&self, painter: &Painter, camera: &Projection, text_color: Color32) {
        let stroke = Stroke::new(1.0, text_color.gamma_multiply(0.6));
        let floor = [
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
        ];
        for k in 0..4 {
            let edge = [camera.point(floor[k]), camera.point(floor[(k + 1) % 4])];
            painter.line_segment(edge, stroke);
        }
        painter.line_segment(
            [camera.point([-0.5, 0.5, -0.5]), camera.point([-0.5, 0.5, 0.5])],
            stroke,
        );

        let [x_bounds, y_bounds, z_bounds] = self.plot.bounds(self.view.z_scale);
        let font = FontId::proportional(11.0);

        let (ticks, step) = surface::nice_ticks(x_bounds.min, x_bounds.max, 5);
        for tick in ticks {
            let x = x_bounds.normalize(tick) - 0.5;
            tick_mark(painter, camera, [x, -0.5, -0.5], [x, -0.56, -0.5], stroke);
            let at = camera.point([x, -0.68, -0.5]);
            let label = surface::format_tick(tick, step);
            painter.text(at, Align2::CENTER_CENTER, label, font.clone(), text_color);
        }
        let (ticks, step) = surface::nice_ticks(y_bounds.min, y_bounds.max, 5);
        for tick in ticks {
            let y = y_bounds.normalize(tick) - 0.5;
            tick_mark(painter, camera, [0.5, y, -0.5], [0.56, y, -0.5], stroke);
            let at = camera.point([0.7, y, -0.5]);
            let label = surface::format_tick(tick, step);
            painter.text(at, Align2::CENTER_CENTER, label, font.clone(), text_color);
        }
        let (ticks, step) = surface::nice_ticks(z_bounds.min, z_bounds.max, 5);
        for tick in ticks {
            let z = z_bounds.normalize(tick) - 0.5;
            tick_mark(painter, camera, [-0.5, 0.5, z], [-0.56, 0.5, z], stroke);
            let at = camera.point([-0.6, 0.5, z]);
            let label = self.view.z_scale.tick_label(tick, step);
            painter.text(at, Align2::RIGHT_CENTER, label, font.clone(), text_color);
        }

        let label_font = FontId::proportional(14.0);
        let labels = [
            ([0.0, -0.85, -0.5], surface::DISTANCE_LABEL),
            ([0.9, 0.0, -0.5], surface::WAVELENGTH_LABEL),
            ([-0.5, 0.5, 0.68], surface::BER_LABEL),
        ];
        for (at, label) in labels {
            let at = camera.point(at);
            painter.text(at, Align2::CENTER_CENTER, label, label_font.clone(), text_color);
        }
    }

    fn paint_colorbar(&self, painter: &Painter, bar: Rect, text_color: Color32) {
        const STEPS: usize = 64;
        let height = bar.height() / STEPS as f32;
        for k in 0..STEPS {
            let t = (k as f64 + 0.5) / STEPS as f64;
            let top = bar.bottom() - height * (k + 1) as f32;
            let stripe =
                Rect::from_min_size(pos2(bar.left(), top), vec2(bar.width(), height + 0.5));
            painter.rect_filled(stripe, 0.0, surface::viridis(t));
        }
        painter.rect_stroke(bar, 0.0, Stroke::new(1.0, text_color.gamma_multiply(0.6)));

        let [_, _, z_bounds] = self.plot.bounds(self.view.z_scale);
        let (ticks, step) = surface::nice_ticks(z_bounds.min, z_bounds.max, 5);
        for tick in ticks {
            let y = bar.bottom() - bar.height() * z_bounds.normalize(tick) as f32;
            painter.line_segment(
                [pos2(bar.right(), y), pos2(bar.right() + 4.0, y)],
                Stroke::new(1.0, text_color),
            );
            painter.text(
                pos2(bar.right() + 6.0, y),
                Align2::LEFT_CENTER,
                self.view.z_scale.tick_label(tick, step),
                FontId::proportional(11.0),
                text_color,
            );
        }
    }
}

impl eframe::App for SurfaceApp {
    fn save(&mut self, storage: &mut dyn Storage) {
        eframe::set_value(storage, VIEW_KEY, &self.view);
    }

    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                if ui.button("Reset view").clicked() {
                    self.view = ViewState::default();
                }
                ui.separator();
                ui.selectable_value(&mut self.view.z_scale, ZScale::Linear, "Linear BER");
                ui.selectable_value(&mut self.view.z_scale, ZScale::Log10, "Log BER");
                ui.separator();
                egui::widgets::global_theme_preference_buttons(ui);
            });
        });
        egui::SidePanel::left("side_panel").resizable(false).show(ctx, |ui| {
            ui.collapsing("How to use", |ui| {
                ui.set_max_width(280.0);
                ui.label(
                    "Drag the plot to rotate it. The view and the BER scale are restored \
                     on the next launch; the results are not.",
                );
            });
            self.ui_parameters(ui);
            self.ui_summary(ui);
        });
        CentralPanel::default().show(ctx, |ui| {
            self.ui_surface(ui);
        });
    }
}

/// Opens the plot window and blocks until it is closed.
pub fn render(plot: SurfacePlot, parameters: Vec<(&'static str, String)>) -> LinkResult<()> {
    let viewport_builder = ViewportBuilder::default()
        .with_inner_size([1200.0, 800.0])
        .with_title(surface::TITLE);
    let native_options = eframe::NativeOptions {
        viewport: viewport_builder,
        ..eframe::NativeOptions::default()
    };
    log::info!("Opening plot window");
    eframe::run_native(
        "Optical Link Simulation",
        native_options,
        Box::new(|cc| SurfaceApp::new(cc, plot, parameters)),
    )
    // eframe errors may hold window handles, which are not Send
    .map_err(|err| LinkError::Render(err.to_string()))
}

/// Rows of the parameter table shown next to the plot.
pub fn parameter_rows(config: &Configuration) -> Vec<(&'static str, String)> {
    let axis = |values: &[f64], factor: f64, unit: &str| match (values.first(), values.last()) {
        (Some(first), Some(last)) => {
            format!("{:.0} .. {:.0} {unit} ({} pts)", first * factor, last * factor, values.len())
        }
        _ => "empty".to_owned(),
    };
    vec![
        ("Speed of light", format_quantity(config.speed_of_light, "m/s")),
        ("Wavelengths", axis(&config.wavelengths, 1e9, "nm")),
        ("Distances", axis(&config.distances, 1e-3, "km")),
        ("Tx aperture", format_quantity(config.aperture_diameter, "m")),
        ("Rx aperture", format_quantity(config.receiver_diameter, "m")),
        (
            "Tx power",
            format!(
                "{} ({:.1} dBm)",
                format_quantity(config.power_transmitted, "W"),
                calc::watt_to_dbm(config.power_transmitted)
            ),
        ),
        ("Cn²", format!("{:e} m^-2/3", config.refractive_index_structure)),
        (
            "Receiver noise",
            format!(
                "{} ({:.1} dBm)",
                format_quantity(config.receiver_noise, "W"),
                calc::watt_to_dbm(config.receiver_noise)
            ),
        ),
    ]
}

/// SI prefix for large values, scientific notation for tiny ones.
pub fn format_quantity(value: f64, unit: &str) -> String {
    if value != 0.0 && value.abs() < 0.01 {
        return format!("{value:e} {unit}");
    }
    match NumberPrefix::decimal(value) {
        NumberPrefix::Standalone(num) => {
            format!("{num} {unit}")
        }
        NumberPrefix::Prefixed(prefix, num) => {
            format!("{:.1} {}{unit}", num, prefix)
        }
    }
}

fn tick_mark(painter: &Painter, camera: &Projection, from: [f64; 3], to: [f64; 3], stroke: Stroke) {
    painter.line_segment([camera.point(from), camera.point(to)], stroke);
}

fn frame_styled(ui: &Ui) -> egui::Frame {
    egui::Frame::default()
        .stroke(ui.visuals().widgets.noninteractive.bg_stroke)
        .rounding(ui.visuals().widgets.noninteractive.rounding)
        .inner_margin(5.0)
        .outer_margin(5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(3e8, "m/s"), "300.0 Mm/s");
        assert_eq!(format_quantity(1e-12, "W"), "1e-12 W");
        assert_eq!(format_quantity(0.1, "m"), "0.1 m");
        assert_eq!(format_quantity(1.0, "W"), "1 W");
    }

    #[test]
    fn test_parameter_rows_cover_configuration() {
        let rows = parameter_rows(&Configuration::default());
        assert_eq!(rows.len(), 8);
        let tx = rows.iter().find(|(name, _)| *name == "Tx power").unwrap();
        assert_eq!(tx.1, "1 W (30.0 dBm)");
        let distances = rows.iter().find(|(name, _)| *name == "Distances").unwrap();
        assert_eq!(distances.1, "1 .. 1000 km (100 pts)");
        let wavelengths = rows.iter().find(|(name, _)| *name == "Wavelengths").unwrap();
        assert_eq!(wavelengths.1, "800 .. 1600 nm (50 pts)");
    }

    #[test]
    fn test_view_rotation_is_bounded() {
        let mut view = ViewState::default();
        view.rotate(egui::vec2(0.0, 1000.0));
        assert_eq!(view.elevation, 90.0);
        view.rotate(egui::vec2(900.0, 0.0));
        assert!((0.0..360.0).contains(&view.azimuth));
    }
}
