// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use assert_cmd::Command;
use framemark::AnnotationsRecord;
use serde_json::{Value, json};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Writes a task with one car rectangle on frame 3 (client id 1) and a car
/// track keyed on frames 0 and 10 (client id 2).
fn write_task(dir: &TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let frames: serde_json::Map<String, Value> = (0..=10)
        .map(|frame| (frame.to_string(), json!({ "width": 100, "height": 100 })))
        .collect();
    let task = json!({
        "labels": [{ "id": 1, "name": "car", "attributes": [] }],
        "frames": frames,
        "annotations": {
            "shapes": [{
                "type": "rectangle",
                "frame": 3,
                "label_id": 1,
                "points": [0, 0, 10, 10]
            }],
            "tracks": [{
                "frame": 0,
                "label_id": 1,
                "shapes": [
                    { "type": "rectangle", "frame": 0, "points": [0, 0, 10, 10] },
                    { "type": "rectangle", "frame": 10, "points": [10, 10, 20, 20] }
                ]
            }]
        }
    });

    let path = dir.path().join("task.json");
    fs::write(&path, serde_json::to_string(&task)?)?;
    Ok(path)
}

#[test]
fn test_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn test_stats() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).arg("stats");
    let stdout = cmd.ok()?.stdout;

    let stats: Value = serde_json::from_slice(&stdout)?;
    let car = &stats["label"]["car"];
    assert_eq!(car["rectangle"]["shape"], json!(1));
    assert_eq!(car["rectangle"]["track"], json!(1));
    assert_eq!(car["manually"], json!(3));
    assert_eq!(car["interpolated"], json!(9));
    assert_eq!(stats["total"]["total"], json!(12));
    Ok(())
}

#[test]
fn test_frame_interpolates_track() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).args(["frame", "5"]);
    let stdout = cmd.ok()?.stdout;

    let states: Vec<Value> = serde_json::from_slice(&stdout)?;
    assert_eq!(states.len(), 1);
    assert_eq!(states[0]["clientID"], json!(2));
    assert_eq!(states[0]["points"], json!([5.0, 5.0, 15.0, 15.0]));
    assert_eq!(states[0]["keyframe"], json!(false));
    Ok(())
}

#[test]
fn test_select() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).args(["select", "0", "5", "5"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"distance\": 5.0"));

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).args(["select", "0", "50", "50"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"distance\": null"));
    Ok(())
}

#[test]
fn test_merge_writes_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;
    let output = dir.path().join("merged.json");

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task")
        .arg(&task)
        .args(["merge", "--ids", "1,2", "--output"])
        .arg(&output);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("into track 3"));

    let merged: AnnotationsRecord = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert!(merged.shapes.is_empty());
    assert_eq!(merged.tracks.len(), 1);
    assert_eq!(merged.tracks[0].frame, 0);
    Ok(())
}

#[test]
fn test_split_writes_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;
    let output = dir.path().join("split.json");

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task")
        .arg(&task)
        .args(["split", "2", "5", "--output"])
        .arg(&output);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Split track 2"));

    let split: AnnotationsRecord = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert_eq!(split.tracks.len(), 2);
    assert_eq!(split.shapes.len(), 1);
    Ok(())
}

#[test]
fn test_group() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).args(["group", "--ids", "1,2"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("are in group 1"));
    Ok(())
}

#[test]
fn test_unknown_id_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).args(["merge", "--ids", "99"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("99"));
    Ok(())
}

#[test]
fn test_missing_task_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(dir.path().join("missing.json")).arg("stats");
    cmd.assert().failure();
    Ok(())
}

#[test]
fn test_config_stop_frame() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;
    let config = dir.path().join("settings.toml");
    fs::write(&config, "stop_frame = 14\n")?;

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task")
        .arg(&task)
        .arg("--config")
        .arg(&config)
        .arg("stats");
    let stdout = cmd.ok()?.stdout;

    let stats: Value = serde_json::from_slice(&stdout)?;
    assert_eq!(stats["label"]["car"]["manually"], json!(3));
    assert_eq!(stats["label"]["car"]["interpolated"], json!(13));
    Ok(())
}

#[test]
fn test_save_twice_bumps_version() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let task = write_task(&dir)?;
    let store = dir.path().join("store.json");

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).arg("save").arg(&store);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"version\": 1"));

    let mut cmd = Command::cargo_bin("framemark")?;
    cmd.arg("--task").arg(&task).arg("save").arg(&store);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"version\": 2"));
    Ok(())
}
