//! Post-build task sequencing through the binary.

use anyhow::{Context, Result, ensure};
use assert_cmd::Command;
use serde_json::{Value, json};
use std::fs;
use test_support::{FakeNinja, Project};

fn config(tasks: &Value) -> Value {
    json!({
        "toolchains": {"gcc": {"root": "/usr/bin", "tools": {"CC": "gcc", "LD": "gcc", "OBJCOPY": "true"}}},
        "targets": {
            "fw": {
                "toolchain": "gcc",
                "productName": "fw.elf",
                "configurations": {
                    "release": {"productDir": "out", "postBuildTasks": tasks}
                }
            }
        }
    })
}

fn run(project: &Project) -> Result<assert_cmd::assert::Assert> {
    let ninja = FakeNinja::new(0)?;
    Ok(Command::cargo_bin("crossbuild")
        .context("locate crossbuild binary")?
        .current_dir(project.root())
        .env("TMPDIR", project.tmp())
        .arg("-n")
        .arg(ninja.path())
        .args(["-t", "fw", "-c", "release"])
        .assert())
}

#[cfg(unix)]
#[test]
fn first_failing_task_stops_the_sequence() -> Result<()> {
    let project = Project::with_config(&config(&json!([
        {"command": "touch", "args": ["done.txt"]},
        {"command": "false"},
        {"command": "touch", "args": ["never.txt"]}
    ])))?;
    run(&project)?.failure();
    ensure!(project.path("done.txt").exists(), "first task did not run");
    ensure!(!project.path("never.txt").exists(), "task after a failure ran");
    Ok(())
}

#[cfg(unix)]
#[test]
fn task_output_is_captured() -> Result<()> {
    let project = Project::with_config(&config(&json!([
        {"command": "sh", "args": ["-c", "echo size of ${productFile}"], "outFile": "size.txt"}
    ])))?;
    run(&project)?.success();
    let captured = fs::read_to_string(project.path("size.txt"))?;
    ensure!(captured == "size of out/fw.elf\n", "captured {captured:?}");
    Ok(())
}

#[cfg(unix)]
#[test]
fn tool_tasks_run_the_toolchain_executable() -> Result<()> {
    let project = Project::with_config(&config(&json!([
        {"tool": "OBJCOPY", "args": ["-O", "binary"]},
        {"command": "touch", "args": ["after.txt"]}
    ])))?;
    run(&project)?.success();
    ensure!(project.path("after.txt").exists(), "sequence stopped after tool task");
    Ok(())
}
