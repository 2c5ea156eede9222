use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).expect("serialize"))
        .expect("write fixture");
}

fn valid_source() -> Value {
    json!({
        "Products": [
            {
                "ID": "1",
                "Handle": "stolicka",
                "Command": "MERGE",
                "Title": "Stolička",
                "Body HTML": "<p>x</p>",
                "Tags": "PRD:Hidden,UPD:2024-01-01",
                "Variant SKU": "SKU-1",
                "Variant Metafield: mf_pvp.MKT_ID_SHOPSYS [number_integer]": 11
            }
        ]
    })
}

fn archiver_in(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("catalog-archiver");
    cmd.current_dir(dir)
        .env("ARCHIVER_CONFIG_PATH", dir.join("no-config.toml"))
        .env_remove("ARCHIVER_RETENTION_DAYS")
        .env_remove("ARCHIVER_REFERENCE_DATE")
        .env_remove("PIM_SNAPSHOT_DIR")
        .env_remove("PIM_IMAGE_BASE_URL");
    cmd
}

#[test]
fn check_passes_a_clean_drop() {
    let tmp = tempdir().expect("tempdir");
    write_json(&tmp.path().join("source_cz.json"), &valid_source());
    write_json(&tmp.path().join("collections_cz.json"), &json!({"77": "obuv"}));

    archiver_in(tmp.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("check: ok"))
        .stdout(predicate::str::contains("bad_tag_dates=0"));
}

#[test]
fn check_flags_corrupt_tag_dates_per_record() {
    let tmp = tempdir().expect("tempdir");
    let mut source = valid_source();
    source["Products"].as_array_mut().expect("rows").push(json!({
        "ID": "2",
        "Handle": "rozbity",
        "Command": "MERGE",
        "Title": "Rozbitý",
        "Body HTML": "",
        "Tags": "PRD:Hidden,UPD:zitra",
        "Variant SKU": "SKU-2",
        "Variant Metafield: mf_pvp.MKT_ID_SHOPSYS [number_integer]": 12
    }));
    write_json(&tmp.path().join("source_cz.json"), &source);
    write_json(&tmp.path().join("collections_cz.json"), &json!({}));

    archiver_in(tmp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("record 2"))
        .stderr(predicate::str::contains("UPD:zitra"));
}

#[test]
fn check_flags_every_missing_column() {
    let tmp = tempdir().expect("tempdir");
    let source = json!({
        "Products": [
            {"ID": "1", "Handle": "a", "Command": "MERGE", "Title": "A"}
        ]
    });
    write_json(&tmp.path().join("source_cz.json"), &source);
    write_json(&tmp.path().join("collections_cz.json"), &json!({}));

    archiver_in(tmp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Body HTML"))
        .stderr(predicate::str::contains("Tags"))
        .stderr(predicate::str::contains("Variant SKU"));
}

#[test]
fn check_flags_missing_grouping_table() {
    let tmp = tempdir().expect("tempdir");
    write_json(&tmp.path().join("source_cz.json"), &valid_source());

    archiver_in(tmp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("collections_cz.json"));
}

#[test]
fn check_flags_unknown_archiver_env_vars() {
    let tmp = tempdir().expect("tempdir");
    write_json(&tmp.path().join("source_cz.json"), &valid_source());
    write_json(&tmp.path().join("collections_cz.json"), &json!({}));

    archiver_in(tmp.path())
        .env("ARCHIVER_RETENTON_DAYS", "30")
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ARCHIVER_RETENTON_DAYS"));
}

#[test]
fn check_flags_env_vars_named_after_log_markers() {
    let tmp = tempdir().expect("tempdir");
    write_json(&tmp.path().join("source_cz.json"), &valid_source());
    write_json(&tmp.path().join("collections_cz.json"), &json!({}));

    // The warning marker appears in the source as a literal, but it is not
    // a configuration key and must not pass the allowlist.
    archiver_in(tmp.path())
        .env("ARCHIVER_WARN", "1")
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ARCHIVER_WARN"));
}

#[test]
fn check_report_is_available_as_json() {
    let tmp = tempdir().expect("tempdir");
    write_json(&tmp.path().join("source_cz.json"), &valid_source());
    write_json(&tmp.path().join("collections_cz.json"), &json!({}));

    let output = archiver_in(tmp.path())
        .args(["check", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: Value = serde_json::from_slice(&output).expect("report JSON");
    assert_eq!(report["command"], "check");
    assert_eq!(report["ok"], true);
}
