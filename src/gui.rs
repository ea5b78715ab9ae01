// src/gui.rs
use std::sync::Arc;
use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints};
use parking_lot::Mutex;
use neurostream::stream::{Pipeline, PlotSeries, RenderTarget};
use neurostream::PipelineState;
/// Repaint handle the render loop drives. The egui context only exists once
/// eframe has created the window, so it is filled in by the app creator.
#[derive(Default)]
pub struct EguiRenderTarget {
    ctx: Mutex<Option<egui::Context>>,
}
impl EguiRenderTarget {
    pub fn attach(&self, ctx: &egui::Context) {
        *self.ctx.lock() = Some(ctx.clone());
    }
}
impl RenderTarget for EguiRenderTarget {
    fn redraw(&self) {
        if let Some(ctx) = self.ctx.lock().as_ref() {
            ctx.request_repaint();
        }
    }
}
pub struct ViewerApp {
    pipeline: Pipeline,
    series: Arc<PlotSeries>,
    // Keeps the target alive; the render loop only holds it weakly.
    _target: Arc<EguiRenderTarget>,
    record_label: String,
    status: String,
}
impl ViewerApp {
    pub fn new(pipeline: Pipeline, target: Arc<EguiRenderTarget>) -> Self {
        let series = pipeline.plot_series();
        Self {
            pipeline,
            series,
            _target: target,
            record_label: "Raw EEG".to_owned(),
            status: "Streaming.".to_owned(),
        }
    }
    /// Stops both loops and finalizes any open recording before the window
    /// goes away.
    pub fn shutdown(&mut self) {
        let outcome = self.pipeline.stop();
        self.report(outcome, "Stopped.");
    }
    fn report(&mut self, outcome: Result<(), neurostream::PipelineError>, ok: &str) {
        self.status = match outcome {
            Ok(()) => ok.to_owned(),
            Err(err) => {
                log::error!("{err}");
                format!("Error: {err}")
            }
        };
    }
    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let running = self.pipeline.state() == PipelineState::Running;
            let pause = if running { "⏸ PAUSE" } else { "▶ RESUME" };
            if ui.button(pause).clicked() {
                let outcome = if running {
                    self.pipeline.on_hidden()
                } else {
                    self.pipeline.on_visible()
                };
                let msg = if running { "Paused." } else { "Streaming." };
                self.report(outcome, msg);
            }
            ui.separator();
            ui.label("Channel");
            let current = self.pipeline.channel_of_interest();
            for ch in 0..self.pipeline.config().channels {
                if ui
                    .selectable_label(current == ch, format!("{}", ch + 1))
                    .clicked()
                    && ch != current
                {
                    let outcome = self.pipeline.set_channel_of_interest(ch);
                    self.report(outcome, &format!("Plotting channel {}.", ch + 1));
                }
            }
        });
        ui.horizontal(|ui| {
            ui.label("Recording label");
            ui.text_edit_singleline(&mut self.record_label);
            let recording = self.pipeline.is_recording();
            let (text, fill) = if recording {
                ("⏹ STOP", Color32::RED)
            } else {
                ("🔴 RECORD", Color32::DARK_GRAY)
            };
            let button = egui::Button::new(egui::RichText::new(text).color(Color32::WHITE)).fill(fill);
            if ui.add(button).clicked() {
                if recording {
                    let outcome = self.pipeline.stop_recording();
                    self.report(outcome, "Recording saved.");
                } else {
                    let label = self.record_label.trim().to_owned();
                    let outcome = self.pipeline.start_recording(&label);
                    self.report(outcome, &format!("Recording `{label}`..."));
                }
            }
        });
    }
}
impl eframe::App for ViewerApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
        log::info!("viewer closed");
    }
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.controls(ui);
            ui.add_space(4.0);
        });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            let stats = self.pipeline.stats();
            ui.horizontal(|ui| {
                ui.label(self.status.as_str());
                ui.separator();
                ui.monospace(format!(
                    "writes {}  overflow {}  rejected {}  cycles {}  frames {}",
                    stats.total_writes,
                    stats.overflow,
                    stats.rejected_packets,
                    stats.drain_cycles,
                    stats.render_ticks
                ));
            });
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            let points = self.series.snapshot();
            let name = format!("Ch{}", self.series.channel() + 1);
            Plot::new("eeg_plot")
                .include_x(0.0)
                .include_x(self.series.capacity() as f64)
                .allow_drag(false)
                .allow_zoom(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::from_ys_f64(&points))
                            .name(name)
                            .color(Color32::from_rgb(0, 255, 255)),
                    );
                });
        });
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use neurostream::stream::{DataSource, ManualSource};
    use neurostream::{MemoryRecorder, PipelineConfig};
    #[test]
    fn shutdown_stops_the_pipeline_and_saves_the_recording() {
        let source = Arc::new(ManualSource::new());
        let target = Arc::new(EguiRenderTarget::default());
        let repaint: Arc<dyn RenderTarget> = target.clone();
        let (recorder, log) = MemoryRecorder::new();
        let data_source: Arc<dyn DataSource> = source.clone();
        let mut pipeline = Pipeline::new(
            PipelineConfig::default(),
            data_source,
            Box::new(recorder),
            Arc::downgrade(&repaint),
        )
        .unwrap();
        pipeline.on_visible().unwrap();
        pipeline.start_recording("closing").unwrap();
        source.emit_rows((0..4).map(|i| vec![i as f64; 4]));
        let mut app = ViewerApp::new(pipeline, target);
        app.shutdown();
        assert_eq!(app.pipeline.state(), PipelineState::Stopped);
        assert!(!app.pipeline.is_recording());
        assert_eq!(source.listener_count(), 0);
        let log = log.lock();
        assert_eq!(log.rows.len(), 4);
        assert_eq!(log.finalized, vec!["closing"]);
        assert_eq!(app.status, "Stopped.");
    }
}
