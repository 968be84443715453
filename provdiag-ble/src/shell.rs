//! Interactive mode: one command per line, each triggering a single step

use std::io::Write as _;

use provdiag_ble_controller::{BleCentral, ScanResult, StepId, Validator};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::report;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Step(StepId),
    Connect(String),
    Disconnect,
    Status,
    Devices,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let first = words.next()?;
    let rest = words.collect::<Vec<_>>().join(" ");

    let command = match first {
        "d" | "disconnect" => Command::Disconnect,
        "s" | "status" => Command::Status,
        "l" | "devices" => Command::Devices,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        "5" if !rest.is_empty() => Command::Connect(rest),
        n => match n.parse().ok().and_then(StepId::from_number) {
            Some(step) => Command::Step(step),
            None => Command::Unknown(n.to_string()),
        },
    };
    Some(command)
}

const HELP: &str = "\
Commands:
  1..4          run step 1-4
  5 <n|name>    connect to device <n> from `devices`, or by id/name
  6, 7          discover / validate (after the previous step passed)
  d             disconnect and reset steps 5-7
  l             list scanned devices
  s             show all steps
  q             quit";

/// Filtered-scan devices first, then unfiltered ones not already listed.
fn listing<C: BleCentral>(v: &Validator<C>) -> Vec<ScanResult> {
    let mut all: Vec<ScanResult> = v.filtered_devices().iter().cloned().collect();
    for d in v.unfiltered_devices().iter() {
        if !v.filtered_devices().contains(&d.id) {
            all.push(d.clone());
        }
    }
    all
}

fn select<C: BleCentral>(v: &Validator<C>, arg: &str) -> Option<ScanResult> {
    match arg.parse::<usize>() {
        Ok(n) => n.checked_sub(1).and_then(|i| listing(v).into_iter().nth(i)),
        Err(_) => v.find_device(arg),
    }
}

pub async fn run<C: BleCentral>(v: &mut Validator<C>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Status => print!("{}", report::render_board(v.board())),
            Command::Devices => {
                let devices = listing(v);
                if devices.is_empty() {
                    println!("No devices - run step 3 or 4 first");
                } else {
                    print!(
                        "{}",
                        report::render_devices(&devices, &v.settings().device_name_prefix)
                    );
                }
            }
            Command::Disconnect => {
                if v.board().can_disconnect() {
                    v.disconnect().await;
                    println!("Disconnected");
                } else {
                    println!("Not connected");
                }
            }
            Command::Connect(arg) => match select(v, &arg) {
                Some(device) => {
                    v.connect(&device).await;
                    print!("{}", report::render_steps(v.board(), &[StepId::Connect]));
                }
                None => println!("No scanned device matches {arg:?}"),
            },
            Command::Step(StepId::Connect) => println!("Usage: 5 <n|name>"),
            Command::Step(step) => {
                if !v.board().is_enabled(step) {
                    println!(
                        "Step {} is disabled until step {} passes",
                        step.number(),
                        step.number() - 1
                    );
                    continue;
                }
                match step {
                    StepId::CreateAdapter => v.create_adapter().await,
                    StepId::AdapterState => v.check_adapter_state().await,
                    StepId::UnfilteredScan => v.scan_unfiltered().await,
                    StepId::FilteredScan => v.scan_filtered().await,
                    StepId::Discover => v.discover().await,
                    StepId::Validate => v.validate(),
                    StepId::Connect => continue,
                }
                print!("{}", report::render_steps(v.board(), &[step]));
            }
            Command::Unknown(word) => println!("Unknown command {word:?} (h for help)"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("1"), Some(Command::Step(StepId::CreateAdapter)));
        assert_eq!(parse_command("7"), Some(Command::Step(StepId::Validate)));
        assert_eq!(parse_command("5"), Some(Command::Step(StepId::Connect)));
        assert_eq!(parse_command("5 2"), Some(Command::Connect("2".to_string())));
        assert_eq!(
            parse_command("5 ESP32-WiFi-A1"),
            Some(Command::Connect("ESP32-WiFi-A1".to_string()))
        );
        assert_eq!(parse_command("d"), Some(Command::Disconnect));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("8"), Some(Command::Unknown("8".to_string())));
        assert_eq!(parse_command("scan"), Some(Command::Unknown("scan".to_string())));
    }
}
