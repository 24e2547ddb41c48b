use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn parse_lines(stdout: &[u8]) -> anyhow::Result<Vec<Value>> {
    let stdout = String::from_utf8(stdout.to_vec())?;
    stdout
        .lines()
        .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
        .collect()
}

fn kinds(lines: &[Value]) -> Vec<&str> {
    lines
        .iter()
        .filter_map(|line| line.get("update").and_then(Value::as_str))
        .collect()
}

#[test]
fn replays_a_browsing_session() -> anyhow::Result<()> {
    let assert = Command::cargo_bin("scopes-replay")?
        .arg(fixture("browse.jsonl"))
        .assert()
        .success();
    let lines = parse_lines(&assert.get_output().stdout)?;
    let kinds = kinds(&lines);

    assert_eq!(kinds.first(), Some(&"search_started"));
    let added = kinds.iter().position(|kind| *kind == "category_added");
    let results = kinds.iter().position(|kind| *kind == "results");
    assert!(added.is_some() && added < results, "{kinds:?}");
    assert!(kinds.contains(&"navigation_merged"));
    assert!(kinds.contains(&"search_finished"));

    let deltas: Vec<&Value> = lines
        .iter()
        .filter(|line| line["update"] == "results")
        .map(|line| &line["delta"])
        .collect();
    assert_eq!(
        deltas[1],
        &json!({
            "ops": [{"op": "insert", "at": 2, "count": 1}],
            "previous_len": 2,
            "len": 3,
        })
    );

    let bound: Vec<&Value> = lines
        .iter()
        .filter(|line| line["update"] == "view_bound")
        .collect();
    assert_eq!(bound.len(), 2);
    assert_eq!(bound[0]["navigation"]["subdepartments"][1]["id"], "movies");
    assert_eq!(bound[1]["kind"], "alt_navigation");
    assert_eq!(bound[1]["navigation"]["subdepartments"][0]["is_active"], true);

    let last = lines.last().expect("output");
    assert_eq!(last["update"], "results");
    assert_eq!(last["delta"]["ops"][0]["op"], "data_changed");
    Ok(())
}

#[test]
fn reads_the_script_from_stdin() -> anyhow::Result<()> {
    Command::cargo_bin("scopes-replay")?
        .arg("-")
        .write_stdin("{\"step\": \"search\", \"query\": \"jazz\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""query":"jazz""#));
    Ok(())
}

#[test]
fn bad_step_names_its_line() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let script = tmp.path().join("broken.jsonl");
    fs::write(&script, "{\"step\": \"search\"}\n{\"step\": \"rewind\"}\n")?;

    Command::cargo_bin("scopes-replay")?
        .arg(&script)
        .assert()
        .failure()
        .stdout(predicate::str::contains("search_started"))
        .stderr(predicate::str::contains("line 2: invalid step"));
    Ok(())
}

#[test]
fn config_file_is_validated() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let config = tmp.path().join("scope.toml");
    fs::write(&config, "aggregation_decay_ms = 0\n")?;

    Command::cargo_bin("scopes-replay")?
        .arg(fixture("browse.jsonl"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("aggregation_decay_ms must be > 0"));
    Ok(())
}

#[test]
fn navigation_stays_visible_for_queries_when_configured() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let config = tmp.path().join("scope.toml");
    fs::write(&config, "navigation_requires_empty_query = false\n")?;
    let script = tmp.path().join("query.jsonl");
    fs::write(
        &script,
        concat!(
            "{\"step\": \"search\", \"query\": \"kindle\"}\n",
            "{\"step\": \"chunk\", \"chunk\": {\"status\": \"finished\", ",
            "\"departments\": {\"id\": \"\", \"label\": \"All\"}}}\n",
        ),
    )?;

    let assert = Command::cargo_bin("scopes-replay")?
        .arg(&script)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
    let lines = parse_lines(&assert.get_output().stdout)?;
    assert!(lines.iter().any(|line| {
        line["update"] == "has_navigation_changed" && line["has_navigation"] == true
    }));
    Ok(())
}
