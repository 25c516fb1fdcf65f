// src/data.rs
use crate::gesture::GestureEvent;
use crate::session::{Channel, ChannelReport, ControlOutput};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct ControlRecord {
    timestamp: String,
    elapsed_ms: i64,
    frame: u64,

    brightness: u8,
    brightness_locked: bool,
    brightness_gesture: &'static str,
    brightness_observed: bool,

    volume: u8,
    volume_locked: bool,
    volume_gesture: &'static str,
    volume_observed: bool,

    status: String,
}

/// Per-channel totals over a recorded session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSummary {
    pub observed_frames: usize,
    pub locked_frames: usize,
    pub lock_changes: usize,
    pub pinch: usize,
    pub fist: usize,
    pub open: usize,
    pub final_value: Option<u8>,
}

impl ChannelSummary {
    fn add(&mut self, report: &ChannelReport) {
        if report.observed {
            self.observed_frames += 1;
        }
        if report.state.locked {
            self.locked_frames += 1;
        }
        if report.lock_changed {
            self.lock_changes += 1;
        }
        match report.gesture {
            GestureEvent::Pinch => self.pinch += 1,
            GestureEvent::Fist => self.fist += 1,
            GestureEvent::Open => self.open += 1,
            GestureEvent::None => {}
        }
        self.final_value = Some(report.state.current_value);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: usize,
    pub brightness: ChannelSummary,
    pub volume: ChannelSummary,
}

impl SessionSummary {
    pub fn channel(&self, channel: Channel) -> &ChannelSummary {
        match channel {
            Channel::Brightness => &self.brightness,
            Channel::Volume => &self.volume,
        }
    }
}

/// Keeps every frame's output and writes them out at the end of a session.
pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    outputs: Vec<ControlOutput>,
    timestamps: Vec<DateTime<Local>>,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            outputs: Vec::new(),
            timestamps: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn add_frame(&mut self, output: &ControlOutput) {
        self.add_frame_at(output, Local::now());
    }

    pub fn add_frame_at(&mut self, output: &ControlOutput, timestamp: DateTime<Local>) {
        self.outputs.push(output.clone());
        self.timestamps.push(timestamp);
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            frames: self.outputs.len(),
            ..SessionSummary::default()
        };
        for output in &self.outputs {
            summary.brightness.add(&output.brightness);
            summary.volume.add(&output.volume);
        }
        summary
    }

    fn create_dir(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.create_dir()?.join("control_data.csv");
        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        let start = self.timestamps.first().copied();
        for (output, timestamp) in self.outputs.iter().zip(self.timestamps.iter()) {
            let elapsed_ms = start
                .map(|s| (*timestamp - s).num_milliseconds())
                .unwrap_or(0);
            writer.serialize(Self::create_record(output, timestamp, elapsed_ms))?;
        }

        writer.flush()?;
        info!(path = %csv_path.display(), frames = self.outputs.len(), "control data exported");
        Ok(csv_path)
    }

    fn create_record(
        output: &ControlOutput,
        timestamp: &DateTime<Local>,
        elapsed_ms: i64,
    ) -> ControlRecord {
        let b = &output.brightness;
        let v = &output.volume;
        ControlRecord {
            timestamp: timestamp.to_rfc3339(),
            elapsed_ms,
            frame: output.frame,
            brightness: b.state.current_value,
            brightness_locked: b.state.locked,
            brightness_gesture: b.gesture.as_str(),
            brightness_observed: b.observed,
            volume: v.state.current_value,
            volume_locked: v.state.locked,
            volume_gesture: v.gesture.as_str(),
            volume_observed: v.observed,
            status: output.status(),
        }
    }

    pub fn generate_report(&self) -> Result<PathBuf> {
        let report_path = self.create_dir()?.join("report.html");
        std::fs::write(&report_path, self.create_html_report())
            .with_context(|| format!("Failed to write {}", report_path.display()))?;
        info!(path = %report_path.display(), "report written");
        Ok(report_path)
    }

    fn channel_rows(name: &str, c: &ChannelSummary, frames: usize) -> String {
        let pct = |n: usize| {
            if frames == 0 {
                0.0
            } else {
                n as f64 / frames as f64 * 100.0
            }
        };
        let final_value = c
            .final_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            r#"        <h2>{name}</h2>
        <div class="stat-item"><span class="stat-label">Hand Visible:</span> <span class="stat-value">{observed} frames ({observed_pct:.1}%)</span></div>
        <div class="stat-item"><span class="stat-label">Locked:</span> <span class="stat-value">{locked} frames ({locked_pct:.1}%)</span></div>
        <div class="stat-item"><span class="stat-label">Lock Changes:</span> <span class="stat-value">{changes}</span></div>
        <div class="stat-item"><span class="stat-label">Gestures:</span> <span class="stat-value">pinch {pinch} / fist {fist} / open {open}</span></div>
        <div class="stat-item"><span class="stat-label">Final Level:</span> <span class="stat-value">{final_value}</span></div>
"#,
            name = name,
            observed = c.observed_frames,
            observed_pct = pct(c.observed_frames),
            locked = c.locked_frames,
            locked_pct = pct(c.locked_frames),
            changes = c.lock_changes,
            pinch = c.pinch,
            fist = c.fist,
            open = c.open,
            final_value = final_value,
        )
    }

    fn create_html_report(&self) -> String {
        let summary = self.summary();
        let duration_s = match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => (*last - *first).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Gesture Control Report - {session}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .stat-item {{ margin: 10px 0; }}
        .stat-label {{ font-weight: bold; color: #666; }}
        .stat-value {{ color: #4682EA; font-size: 1.2em; }}
    </style>
</head>
<body>
    <h1>Gesture Control Session Report</h1>
    <div class="stats">
        <h2>Session: {session}</h2>
        <div class="stat-item"><span class="stat-label">Total Frames:</span> <span class="stat-value">{frames}</span></div>
        <div class="stat-item"><span class="stat-label">Duration:</span> <span class="stat-value">{duration:.1} s</span></div>
{brightness}{volume}    </div>
</body>
</html>
"#,
            session = self.session_name,
            frames = summary.frames,
            duration = duration_s,
            brightness = Self::channel_rows("Brightness", &summary.brightness, summary.frames),
            volume = Self::channel_rows("Volume", &summary.volume, summary.frames),
        )
    }
}
