//! Built-in variables describing the running process.

use std::ffi::OsString;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{Func, Registry, VarError};

struct StartTime {
    instant: Instant,
    wall: DateTime<Utc>,
}

static STARTED: LazyLock<StartTime> = LazyLock::new(|| StartTime {
    instant: Instant::now(),
    wall: Utc::now(),
});

/// Fields read from `/proc/self/status`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcStatus {
    pub threads: Option<u64>,
    pub vm_rss_bytes: Option<u64>,
    pub vm_size_bytes: Option<u64>,
}

/// Parses the `key:\tvalue` lines of `/proc/<pid>/status`.
#[must_use]
pub fn parse_proc_status(content: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let mut fields = value.split_whitespace();
        let number = fields.next().and_then(|n| n.parse::<u64>().ok());
        // Memory lines carry a "kB" unit.
        let scale = if fields.next() == Some("kB") { 1024 } else { 1 };
        match key {
            "Threads" => status.threads = number,
            "VmRSS" => status.vm_rss_bytes = number.and_then(|n| n.checked_mul(scale)),
            "VmSize" => status.vm_size_bytes = number.and_then(|n| n.checked_mul(scale)),
            _ => {}
        }
    }
    status
}

#[cfg(target_os = "linux")]
fn proc_status() -> Option<ProcStatus> {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .map(|content| parse_proc_status(&content))
}

#[cfg(not(target_os = "linux"))]
fn proc_status() -> Option<ProcStatus> {
    None
}

fn process_value() -> Value {
    let started = &*STARTED;
    let mut value = json!({
        "pid": std::process::id(),
        "started_at": started.wall.to_rfc3339(),
        "uptime_seconds": started.instant.elapsed().as_secs_f64(),
    });

    if let (Some(status), Value::Object(object)) = (proc_status(), &mut value) {
        if let Some(threads) = status.threads {
            object.insert("threads".into(), json!(threads));
        }
        if let Some(rss) = status.vm_rss_bytes {
            object.insert("vm_rss_bytes".into(), json!(rss));
        }
        if let Some(size) = status.vm_size_bytes {
            object.insert("vm_size_bytes".into(), json!(size));
        }
    }
    value
}

/// Renders process arguments, replacing invalid UTF-8 rather than failing.
fn cmdline_value<I>(args: I) -> Value
where
    I: IntoIterator<Item = OsString>,
{
    Value::from(
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>(),
    )
}

/// Publishes `cmdline` and `process` into `registry`.
pub(super) fn publish_builtins(registry: &Registry) -> Result<(), VarError> {
    LazyLock::force(&STARTED);
    registry.publish(
        "cmdline",
        Arc::new(Func::new(|| cmdline_value(std::env::args_os()))),
    )?;
    registry.publish("process", Arc::new(Func::new(process_value)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Name:\texpvard\nState:\tS (sleeping)\nVmSize:\t  123456 kB\nVmRSS:\t    2048 kB\nThreads:\t7\n";

    #[test]
    fn test_parse_proc_status() {
        let status = parse_proc_status(SAMPLE);
        assert_eq!(
            status,
            ProcStatus {
                threads: Some(7),
                vm_rss_bytes: Some(2048 * 1024),
                vm_size_bytes: Some(123_456 * 1024),
            }
        );
    }

    #[test]
    fn test_parse_proc_status_tolerates_garbage() {
        let status = parse_proc_status("garbage\nThreads:\tmany\n");
        assert_eq!(status, ProcStatus::default());
    }

    #[test]
    fn test_parse_proc_status_drops_overflowing_sizes() {
        let content = format!("VmRSS:\t{} kB\nVmSize:\t4 kB\n", u64::MAX);
        let status = parse_proc_status(&content);
        assert_eq!(status.vm_rss_bytes, None);
        assert_eq!(status.vm_size_bytes, Some(4096));
    }

    #[test]
    fn test_cmdline_value() {
        let args = ["expvard", "--config", "a.toml"].map(OsString::from);
        assert_eq!(cmdline_value(args), json!(["expvard", "--config", "a.toml"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_cmdline_with_invalid_utf8_still_renders() {
        use std::os::unix::ffi::OsStringExt;

        let args = vec![OsString::from("expvard"), OsString::from_vec(vec![b'a', 0xff])];
        let registry = Registry::new();
        registry
            .publish("cmdline", Arc::new(Func::new(move || cmdline_value(args.clone()))))
            .unwrap();

        let dump: Value = serde_json::from_str(&crate::expvar::render(&registry)).unwrap();
        assert_eq!(dump["cmdline"], json!(["expvard", "a\u{fffd}"]));
    }

    #[test]
    fn test_process_value_has_pid() {
        let value = process_value();
        assert_eq!(value["pid"], json!(std::process::id()));
        assert!(value["uptime_seconds"].as_f64().is_some());
        assert!(value["started_at"].is_string());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_value_reads_proc_on_linux() {
        let value = process_value();
        assert!(value["threads"].as_u64().is_some_and(|t| t >= 1));
    }

    #[test]
    fn test_publish_builtins() {
        let registry = Registry::new();
        publish_builtins(&registry).unwrap();
        assert_eq!(registry.names(), vec!["cmdline", "process"]);
        assert!(publish_builtins(&registry).is_err());
    }
}
