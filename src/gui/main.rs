#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::sync::mpsc;

use eframe::egui;

use phototag_batch::config::Config;
use phototag_batch::pipeline::{self, Progress};
use phototag_batch::tagging::PhotoTagClient;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([600.0, 400.0])
        .with_min_inner_size([400.0, 300.0]);

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "Image Keywording Tool",
        options,
        Box::new(|cc| Ok(Box::new(App::new(cc)))),
    )
}

// ── Messages sent from the batch task to the UI ─────────────────────

enum BgMessage {
    /// One image was processed and moved.
    Image { line: String, progress: Progress },
    /// The batch finished.
    BatchDone { ready: usize, failed: usize },
    /// The batch could not start.
    Error(String),
}

// ── Main application state ──────────────────────────────────────────

struct App {
    config: Config,
    /// Status log shown in the text area.
    log: Vec<String>,
    /// Progress in percent, 0..=100.
    percent: u8,
    processing: bool,
    rx: mpsc::Receiver<BgMessage>,
    tx: mpsc::Sender<BgMessage>,
    /// Tokio runtime for the batch task.
    rt: tokio::runtime::Runtime,
}

impl App {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let (tx, rx) = mpsc::channel();
        let config = Config::load(None).unwrap_or_default();

        Self {
            config,
            log: vec!["Processing Not Started".into()],
            percent: 0,
            processing: false,
            rx,
            tx,
            rt: tokio::runtime::Runtime::new().expect("Failed to create tokio runtime"),
        }
    }

    fn select_folder(&mut self) {
        if let Some(dir) = rfd::FileDialog::new()
            .set_title("Select Folder")
            .pick_folder()
        {
            self.start_processing(dir);
        }
    }

    fn start_processing(&mut self, dir: PathBuf) {
        if self.processing {
            return;
        }
        if let Err(e) = self.config.validate() {
            self.log.push(format!("Error: {e}"));
            return;
        }

        self.processing = true;
        self.percent = 0;
        self.log = vec![format!("Processing Running... ({})", dir.display())];

        let config = self.config.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            let client = PhotoTagClient::new(&config.service);
            let progress_tx = tx.clone();

            let result = pipeline::run_batch(&dir, &client, &config.output, |outcome, progress| {
                let line = match outcome.failure {
                    Some(ref err) => format!("{} → failed: {err}", outcome.file_name()),
                    None => format!("{} → ready", outcome.file_name()),
                };
                let _ = progress_tx.send(BgMessage::Image { line, progress });
            })
            .await;

            let msg = match result {
                Ok(report) => BgMessage::BatchDone {
                    ready: report.ready_count(),
                    failed: report.failed_count(),
                },
                Err(e) => BgMessage::Error(format!("{e:#}")),
            };
            let _ = tx.send(msg);
        });
    }

    fn poll_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BgMessage::Image { line, progress } => {
                    self.log.push(line);
                    self.percent = progress.percent;
                }
                BgMessage::BatchDone { ready, failed } => {
                    self.processing = false;
                    self.percent = 100;
                    self.log.push(format!("Processing Completed — {ready} ready, {failed} failed"));
                    self.log.push("Close Window to Exit".into());
                }
                BgMessage::Error(msg) => {
                    self.processing = false;
                    self.log.push(format!("Error: {msg}"));
                }
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();

        // Request repaint while processing so we pick up messages
        if self.processing {
            ctx.request_repaint();
        }

        // ── Settings bar ────────────────────────────────────────────
        egui::TopBottomPanel::top("settings").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("API token:");
                ui.add_enabled(
                    !self.processing,
                    egui::TextEdit::singleline(&mut self.config.service.api_token).password(true),
                );
                if ui.add_enabled(!self.processing, egui::Button::new("Save")).clicked() {
                    if let Err(e) = self.config.save(None) {
                        self.log.push(format!("Error: {e:#}"));
                    }
                }
            });
        });

        // ── Bottom toolbar ──────────────────────────────────────────
        egui::TopBottomPanel::bottom("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            if ui
                .add_enabled(!self.processing, egui::Button::new("Select Folder"))
                .clicked()
            {
                self.select_folder();
            }
            ui.add(
                egui::ProgressBar::new(f32::from(self.percent) / 100.0)
                    .text(format!("{}%", self.percent)),
            );
            ui.add_space(4.0);
        });

        // ── Status log ──────────────────────────────────────────────
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for line in &self.log {
                        ui.label(line);
                    }
                });
        });
    }
}
