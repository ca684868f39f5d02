use std::ffi::OsStr;

use assert_cmd::{assert::Assert, Command};
use once_cell::sync::Lazy;
use predicates::prelude::*;
use serde_json::{json, Value};

const BIN: &str = "linktap-ns";
const DATA_DIR_VAR: &str = "LTNS_DATA_DIR";

const TEST_KEY: &str = "api_base_url";
const TEST_VALUE_TEXT: &str = "http://localhost:8080/api/";
static TEST_VALUE_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "devices": [{"gatewayId": "3F7A23FE004B1200", "taplinker": []}],
        "fetched_at": 1700000000
    })
});

fn kvs_set_assert(
    data_dir: impl AsRef<OsStr>,
    key: impl AsRef<OsStr>,
    value: impl AsRef<OsStr>,
) -> Assert {
    Command::cargo_bin(BIN)
        .unwrap()
        .env(DATA_DIR_VAR, data_dir)
        .arg("kvs-set")
        .arg(key)
        .arg(value)
        .assert()
}

fn kvs_get_assert(data_dir: impl AsRef<OsStr>, key: impl AsRef<OsStr>) -> Assert {
    Command::cargo_bin(BIN)
        .unwrap()
        .env(DATA_DIR_VAR, data_dir)
        .arg("kvs-get")
        .arg(key)
        .assert()
}

#[test]
fn set_and_get_string_value() {
    let tempdir = tempfile::tempdir().unwrap();

    kvs_set_assert(tempdir.path(), TEST_KEY, TEST_VALUE_TEXT).success();
    kvs_get_assert(tempdir.path(), TEST_KEY)
        .success()
        .stdout(TEST_VALUE_TEXT);
}

#[test]
fn set_and_get_json_value() {
    let tempdir = tempfile::tempdir().unwrap();

    kvs_set_assert(tempdir.path(), TEST_KEY, TEST_VALUE_JSON.to_string()).success();
    kvs_get_assert(tempdir.path(), TEST_KEY)
        .success()
        .stdout(TEST_VALUE_JSON.to_string());
}

#[test]
fn overwrite_value() {
    let tempdir = tempfile::tempdir().unwrap();

    kvs_set_assert(tempdir.path(), "username", "first").success();
    kvs_set_assert(tempdir.path(), "username", "second").success();
    kvs_get_assert(tempdir.path(), "username")
        .success()
        .stdout("second");
}

#[test]
fn get_unset_value_fails() {
    let tempdir = tempfile::tempdir().unwrap();

    kvs_get_assert(tempdir.path(), TEST_KEY)
        .failure()
        .stdout("")
        .stderr(predicate::str::contains(format!(
            "Error: No value set for key '{TEST_KEY}'"
        )));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin(BIN)
        .unwrap()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Subcommand must be one of"));
}
