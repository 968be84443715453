//! Plain-text rendering of step results and device lists

use std::fmt::Write as _;

use provdiag_ble_controller::{ScanResult, StepBoard, StepId, StepResult, StepStatus};

fn tag(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "PEND",
        StepStatus::Running => "RUN ",
        StepStatus::Pass => "PASS",
        StepStatus::Fail => "FAIL",
    }
}

pub fn render_step(out: &mut String, result: &StepResult, enabled: bool) {
    let disabled = if enabled { "" } else { " (disabled)" };
    let _ = writeln!(
        out,
        "[{}] {}. {}{}",
        tag(result.status),
        result.step.number(),
        result.step.title(),
        disabled
    );
    for entry in &result.log {
        let _ = writeln!(out, "    {} {}", entry.at.format("%H:%M:%S%.3f"), entry.message);
    }
}

/// Renders `steps` in order, each with its full log.
pub fn render_steps(board: &StepBoard, steps: &[StepId]) -> String {
    let mut out = String::new();
    for &step in steps {
        render_step(&mut out, board.get(step), board.is_enabled(step));
    }
    out
}

pub fn render_board(board: &StepBoard) -> String {
    render_steps(board, &StepId::ALL)
}

pub fn render_devices<'a>(
    devices: impl IntoIterator<Item = &'a ScanResult>,
    prefix: &str,
) -> String {
    let mut out = String::new();
    for (i, device) in devices.into_iter().enumerate() {
        let rssi = device
            .rssi
            .map(|r| format!("{r} dBm"))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = match &device.name {
            Some(name) if provdiag_proto::ble::is_provisioning_device(name, prefix) => " [ESP32]",
            _ => "",
        };
        let _ = writeln!(
            out,
            "  {:>2}. {} ({}) RSSI: {}{}",
            i + 1,
            device.display_name(),
            device.id,
            rssi,
            marker
        );
    }
    out
}
