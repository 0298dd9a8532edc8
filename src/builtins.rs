//! Handlers for the built-in line vocabulary that render tables or banners.

use crate::assistant::Assistant;
use crate::executor::Executor;
use crate::table::Table;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// `ctime(3)` layout, e.g. `Thu Oct 16 09:05:00 2026`.
const MODIFIED_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

const DIAGNOSTIC_COMMANDS: &[(&str, &[&str])] = &[
    ("uname", &["-a"]),
    ("uptime", &[]),
    ("df", &["-h"]),
    ("free", &["-h"]),
];

const TROUBLESHOOTING_PROMPT: &str = "You are a Linux troubleshooting assistant built into the crust shell. \
You receive the output of a few diagnostic commands from the user's machine. \
Point out anything that looks wrong (full disks, memory pressure, high load, long uptime without updates) \
and suggest concrete commands to fix it. If everything looks healthy, say so briefly. \
This is not sent by the user. Do not use markdown; what you say is viewed as plain text.";

/// `ls`, `ls -l`, `ls -la`: the entries of `dir` sorted by name.
pub fn list_directory(dir: &Path) -> Result<Table> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Error listing directory {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut table = Table::new("Directory Listing", ["Name", "Type", "Size", "Modified"]);
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        // Follows symlinks, so a link to a directory lists as one.
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot stat {:?}: {}", entry.path(), e);
                table.add_row([name, "Unknown".to_string(), "-".to_string(), "-".to_string()]);
                continue;
            }
        };

        let (kind, size) = if metadata.is_dir() {
            ("Directory", "-".to_string())
        } else {
            ("File", format!("{} bytes", metadata.len()))
        };
        let modified = metadata
            .modified()
            .map(|time| DateTime::<Local>::from(time).format(MODIFIED_FORMAT).to_string())
            .unwrap_or_else(|_| "-".to_string());

        table.add_row([name, kind.to_string(), size, modified]);
    }
    Ok(table)
}

/// `disk usage`, `df -h`: the output of `df -h` as a table.
pub fn disk_usage(executor: &Executor, cwd: &Path) -> Result<Table> {
    let output = executor.capture("df", &["-h"], cwd).context("Error running df")?;
    Ok(parse_df(&output))
}

fn parse_df(output: &str) -> Table {
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());
    let mut headers: Vec<String> = lines
        .next()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    // "Mounted on" is a single column.
    if headers.len() >= 2 && headers[headers.len() - 2] == "Mounted" && headers[headers.len() - 1] == "on" {
        headers.truncate(headers.len() - 2);
        headers.push("Mounted on".to_string());
    }

    let columns = headers.len();
    let mut table = Table::new("Disk Usage", headers);
    for line in lines {
        let mut cells: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        // Mount points may contain spaces; keep them in the last column.
        if columns > 0 && cells.len() > columns {
            let tail = cells.split_off(columns - 1).join(" ");
            cells.push(tail);
        }
        table.add_row(cells);
    }
    table
}

/// Result of the `lsusb` built-in.
#[derive(Debug)]
pub enum UsbListing {
    Devices(Table),
    NotInstalled,
}

/// `lsusb`: connected USB devices, or [`UsbListing::NotInstalled`].
pub fn usb_devices(executor: &Executor, cwd: &Path) -> Result<UsbListing> {
    if !executor.runner().program_exists("lsusb") {
        info!("lsusb is not installed");
        return Ok(UsbListing::NotInstalled);
    }
    let output = executor.capture("lsusb", &[], cwd).context("Error running lsusb")?;
    Ok(UsbListing::Devices(parse_lsusb(&output)))
}

/// Parses lines like `Bus 001 Device 002: ID 8087:0024 Intel Corp. Hub`.
fn parse_lsusb(output: &str) -> Table {
    let mut table = Table::new("USB Devices", ["Bus", "Device", "ID", "Description"]);
    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            if !line.trim().is_empty() {
                warn!("Skipping malformed lsusb line: {:?}", line);
            }
            continue;
        }
        table.add_row([
            parts[1].to_string(),
            parts[3].trim_end_matches(':').to_string(),
            parts[5].to_string(),
            parts[6..].join(" "),
        ]);
    }
    table
}

/// `about`: name, author, version.
pub fn about() -> String {
    let plus = [" + ", "+++", " + "];
    let lines = [
        "Crust Shell".to_string(),
        "Author: Juraj Kollár (mostypc123)".to_string(),
        format!("Version: {}", env!("CARGO_PKG_VERSION")),
    ];
    plus.iter()
        .zip(lines.iter())
        .map(|(plus, line)| format!("{} {}", plus, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Output of the diagnostic commands, each under a header line.
pub fn gather_diagnostics(executor: &Executor, cwd: &Path) -> String {
    let mut report = String::new();
    for (program, args) in DIAGNOSTIC_COMMANDS {
        let command = std::iter::once(*program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let body = match executor.capture(program, args, cwd) {
            Ok(output) => output,
            Err(e) => {
                warn!("Diagnostic {} failed: {}", command, e);
                format!("unavailable: {}\n", e)
            }
        };
        report.push_str(&format!("$ {}\n{}\n", command, body.trim_end()));
    }
    report
}

/// `troubleshooting`: asks the assistant to diagnose this machine.
pub async fn troubleshoot(assistant: &Assistant, executor: &Executor, cwd: &Path) -> Result<String> {
    let report = gather_diagnostics(executor, cwd);
    info!("Sending {} bytes of diagnostics", report.len());
    assistant.one_shot(TROUBLESHOOTING_PROMPT, &report).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::mock::ScriptedApproval;
    use crate::chat_client::mock::ScriptedChatClient;
    use crate::executor::mock::MockProcessRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn executor(runner: MockProcessRunner) -> Executor {
        Executor::new(Arc::new(runner))
    }

    #[test]
    fn test_listing_is_sorted_with_sizes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "12345").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();

        let table = list_directory(dir.path()).unwrap();
        let rows = table.rows();

        let names: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["a_dir", "b.txt", "c.txt"]);
        assert_eq!(rows[0][1], "Directory");
        assert_eq!(rows[0][2], "-");
        assert_eq!(rows[1][1], "File");
        assert_eq!(rows[1][2], "5 bytes");
        assert_eq!(rows[2][2], "0 bytes");
        // Weekday, month, day, time, year.
        assert_eq!(rows[1][3].split_whitespace().count(), 5);
    }

    #[test]
    fn test_listing_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(list_directory(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn test_df_output_parsed() {
        let output = "Filesystem      Size  Used Avail Use% Mounted on\n\
                      /dev/nvme0n1p2  468G  201G  244G  46% /\n\
                      tmpfs           7.8G  4.0K  7.8G   1% /run/media/My Disk\n";
        let runner = MockProcessRunner::new().with_success("df", output);

        let table = disk_usage(&executor(runner), Path::new("/")).unwrap();

        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0], vec!["/dev/nvme0n1p2", "468G", "201G", "244G", "46%", "/"]);
        assert_eq!(table.rows()[1][5], "/run/media/My Disk");
    }

    #[test]
    fn test_df_failure_is_an_error() {
        let runner = MockProcessRunner::new().with_failure("df", 1, "boom");
        assert!(disk_usage(&executor(runner), Path::new("/")).is_err());
    }

    #[test]
    fn test_lsusb_rows_and_malformed_lines() {
        let output = "Bus 001 Device 002: ID 8087:0024 Intel Corp. Integrated Rate Matching Hub\n\
                      garbage\n\
                      Bus 002 Device 001: ID 1d6b:0003 Linux Foundation 3.0 root hub\n";
        let runner = MockProcessRunner::new().with_success("lsusb", output);

        let UsbListing::Devices(table) = usb_devices(&executor(runner), Path::new("/")).unwrap() else {
            panic!("expected devices");
        };

        assert_eq!(table.rows().len(), 2);
        assert_eq!(
            table.rows()[0],
            vec!["001", "002", "8087:0024", "Intel Corp. Integrated Rate Matching Hub"]
        );
        assert_eq!(table.rows()[1][3], "Linux Foundation 3.0 root hub");
    }

    #[test]
    fn test_lsusb_absent_is_reported() {
        let listing = usb_devices(&executor(MockProcessRunner::new()), Path::new("/")).unwrap();
        assert!(matches!(listing, UsbListing::NotInstalled));
    }

    #[test]
    fn test_about_shows_version() {
        let banner = about();
        assert!(banner.contains("Crust Shell"));
        assert!(banner.contains(env!("CARGO_PKG_VERSION")));
        assert_eq!(banner.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_troubleshoot_sends_diagnostics_in_one_shot() {
        let runner = MockProcessRunner::new()
            .with_success("uname", "Linux box 6.1\n")
            .with_success("uptime", " 10:00 up 3 days\n")
            .with_success("df", "Filesystem Size\n");
        let executor = executor(runner);
        let chat = Arc::new(ScriptedChatClient::new(&["All good."]));
        let assistant = Assistant::new(
            chat.clone(),
            Box::new(ScriptedApproval::new(&[])),
            executor.clone(),
            false,
        );

        let reply = troubleshoot(&assistant, &executor, Path::new("/")).await.unwrap();

        assert_eq!(reply, "All good.");
        let sent = &chat.requests()[0][1].text;
        assert!(sent.contains("$ uname -a\nLinux box 6.1"));
        assert!(sent.contains("$ uptime\n 10:00 up 3 days"));
        // free is missing but the report still goes out.
        assert!(sent.contains("$ free -h\nunavailable"));
    }
}
