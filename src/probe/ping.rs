//! ICMP echo via the system `ping` utility.
//!
//! Raw ICMP sockets need elevated privileges on most systems; the setuid or
//! capability-enabled `ping` binary does not.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use super::http::ProbeError;

fn rtt_pattern() -> Option<&'static Regex> {
    static RTT: OnceLock<Option<Regex>> = OnceLock::new();
    RTT.get_or_init(|| Regex::new(r"(?i)time\s*[=<]\s*([\d.]+)\s*ms").ok())
        .as_ref()
}

/// Extract the round-trip time from one line of `ping` output.
pub fn parse_rtt_ms(output: &str) -> Option<f64> {
    let re = rtt_pattern()?;
    output
        .lines()
        .filter_map(|line| re.captures(line))
        .find_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
}

fn ping_args(host: &str, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1).to_string();
    if cfg!(windows) {
        let ms = timeout.as_millis().max(1).to_string();
        vec!["-n".into(), "1".into(), "-w".into(), ms, host.into()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-t".into(), secs, host.into()]
    } else {
        vec!["-c".into(), "1".into(), "-W".into(), secs, host.into()]
    }
}

/// Send one echo request. Returns the RTT in ms when the output carries one.
pub(crate) async fn ping_once(host: &str, timeout: Duration) -> Result<Option<f64>, ProbeError> {
    let mut command = Command::new("ping");
    command
        .args(ping_args(host, timeout))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // The utility enforces its own wait; the outer bound covers DNS stalls.
    let output = match tokio::time::timeout(timeout + Duration::from_secs(1), command.output()).await {
        Err(_) => return Err(ProbeError::Timeout),
        Ok(Err(e)) => return Err(ProbeError::Transport(format!("Ping error: {e}"))),
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    // Windows ping exits 0 on "Destination host unreachable" replies.
    let rtt = parse_rtt_ms(&stdout);
    if output.status.success() && (rtt.is_some() || !cfg!(windows)) {
        Ok(rtt)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().next().map(str::trim).filter(|l| !l.is_empty());
        Err(ProbeError::NoReply(detail.unwrap_or("TimedOut").to_string()))
    }
}
