
use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use support_run::{run_loadpulse, spawn_http_server_or_skip};

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn describe(output: &std::process::Output) -> String {
    format!(
        "status: {:?}\nstdout: {}\nstderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn e2e_capped_run_reports_summary_and_snapshots() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip(200)? else {
        return Ok(());
    };
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let snapshots = dir.path().join("snapshots.jsonl");

    let output = run_loadpulse([
        "-u",
        url.as_str(),
        "-n",
        "20",
        "-c",
        "4",
        "--snapshot-interval",
        "100ms",
        "--snapshot-out",
        snapshots.to_string_lossy().as_ref(),
        "--no-color",
    ])?;
    if !output.status.success() {
        return Err(describe(&output));
    }

    let stdout = stdout_of(&output);
    for expected in [
        "State: stopped",
        "Stopped by: request cap reached",
        "Total Requests: 20",
        "Successful: 20 (100.00%)",
        "Status Codes: 200=20",
    ] {
        if !stdout.lines().any(|line| line == expected) {
            return Err(format!("Missing '{}'\n{}", expected, describe(&output)));
        }
    }

    let content =
        fs::read_to_string(&snapshots).map_err(|err| format!("read snapshots failed: {}", err))?;
    let last = content
        .lines()
        .last()
        .ok_or_else(|| "snapshot file is empty".to_owned())?;
    let value: serde_json::Value =
        serde_json::from_str(last).map_err(|err| format!("invalid snapshot line: {}", err))?;
    if value.get("kind").and_then(serde_json::Value::as_str) != Some("final") {
        return Err(format!("Last snapshot must be final: {}", last));
    }
    if value.pointer("/counts/total").and_then(serde_json::Value::as_u64) != Some(20) {
        return Err(format!("Final snapshot must count 20 requests: {}", last));
    }
    Ok(())
}

#[test]
fn e2e_unexpected_status_counts_as_assertion_failure() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip(500)? else {
        return Ok(());
    };

    let output = run_loadpulse(["-u", url.as_str(), "-n", "5", "-c", "2", "--no-color"])?;
    if !output.status.success() {
        return Err(describe(&output));
    }
    let stdout = stdout_of(&output);
    if !stdout
        .lines()
        .any(|line| line == "Failed: 5 (target 0, assertion 5, scenario 0)")
    {
        return Err(describe(&output));
    }
    Ok(())
}

#[test]
fn e2e_rate_mode_runs_for_duration() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip(200)? else {
        return Ok(());
    };

    let output = run_loadpulse([
        "-u",
        url.as_str(),
        "-t",
        "1s",
        "--rate",
        "20",
        "-c",
        "4",
        "--no-color",
    ])?;
    if !output.status.success() {
        return Err(describe(&output));
    }
    let stdout = stdout_of(&output);
    if !stdout
        .lines()
        .any(|line| line == "Stopped by: duration elapsed")
    {
        return Err(describe(&output));
    }
    Ok(())
}

#[test]
fn e2e_failed_preflight_exits_non_zero() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip(503)? else {
        return Ok(());
    };

    let output = run_loadpulse(["-u", url.as_str(), "-n", "5", "--preflight", "--no-color"])?;
    if output.status.success() {
        return Err(format!("Preflight against 503 must fail\n{}", describe(&output)));
    }
    if stdout_of(&output).contains("Total Requests") {
        return Err(format!("No run may start after a failed preflight\n{}", describe(&output)));
    }
    Ok(())
}

#[test]
fn e2e_unbounded_run_is_rejected() -> Result<(), String> {
    let output = run_loadpulse(["-u", "http://127.0.0.1:9/", "--no-color"])?;
    if output.status.success() {
        return Err(format!("A run without -n or -t must be rejected\n{}", describe(&output)));
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn e2e_sigterm_stops_gracefully() -> Result<(), String> {
    use support_run::{read_stdout, spawn_loadpulse_with_output, wait_for_exit};

    let Some((url, _server)) = spawn_http_server_or_skip(200)? else {
        return Ok(());
    };

    let mut child =
        spawn_loadpulse_with_output(["-u", url.as_str(), "-t", "60s", "-c", "2", "--no-color"])?;
    std::thread::sleep(Duration::from_millis(1_500));

    let kill = std::process::Command::new("kill")
        .arg("-TERM")
        .arg(child.id().to_string())
        .status()
        .map_err(|err| format!("kill failed: {}", err))?;
    if !kill.success() {
        drop(child.kill());
        return Err("kill -TERM was rejected".to_owned());
    }

    let status = wait_for_exit(&mut child, Duration::from_secs(15))?;
    let stdout = read_stdout(&mut child)?;
    if !status.success() {
        return Err(format!("status: {:?}\nstdout: {}", status.code(), stdout));
    }
    if !stdout.lines().any(|line| line == "Stopped by: stop requested") {
        return Err(format!("Expected a graceful stop\n{}", stdout));
    }
    Ok(())
}
