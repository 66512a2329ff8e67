use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

#[test]
fn no_arguments_prints_help() {
    cargo_bin_cmd!("emlc")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("emlc index.eml index.html"));
}

#[test]
fn slash_question_mark_prints_help() {
    cargo_bin_cmd!("emlc")
        .arg("/?")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag() {
    cargo_bin_cmd!("emlc")
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("emlc version "));
}

#[test]
fn missing_output_fails() {
    cargo_bin_cmd!("emlc")
        .arg("index.eml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing output file path"));
}

#[test]
fn unreadable_input_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("absent.eml");
    let output = dir.path().join("out.html");

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not open"));
    assert!(!output.exists());
}

#[cfg(unix)]
#[test]
fn non_utf8_input_path_fails_cleanly() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let input = dir.path().join(OsStr::from_bytes(b"in\xff.eml"));
    let output = dir.path().join("out.html");

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not open"));
    assert!(!output.exists());
}

#[test]
fn converts_eml_to_xml() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("view.eml");
    let output = dir.path().join("view.xml");
    fs::write(&input, "div (class=\"a\", id=\"b\") { span { Hi } }\nbr\n").unwrap();

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted"))
        .stdout(predicate::str::contains("->"));

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "<div class=\"a\" id=\"b\">\n    <span>Hi</span>\n</div>\n<br/>\n"
    );
}

#[test]
fn converts_html_to_eml() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("index.html");
    let output = dir.path().join("index.eml");
    fs::write(&input, "<div><p>Hi</p></div>\n").unwrap();

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "div {\n    p { Hi }\n}\n"
    );
}

#[test]
fn indent_flag_overrides_width() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("page.eml");
    let output = dir.path().join("page.html");
    fs::write(&input, "div { span { Hi } }").unwrap();

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .arg("--indent")
        .arg("2")
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "<div>\n  <span>Hi</span>\n</div>\n"
    );
}

#[test]
fn config_file_sets_indent() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("page.eml");
    let output = dir.path().join("page.html");
    let config = dir.path().join("emlc.toml");
    fs::write(&input, "div { span { Hi } }").unwrap();
    fs::write(&config, "[render]\nindent = \"\\t\"\n").unwrap();

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "<div>\n\t<span>Hi</span>\n</div>\n"
    );
}

#[test]
fn bad_config_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("page.eml");
    let output = dir.path().join("page.html");
    let config = dir.path().join("emlc.toml");
    fs::write(&input, "br").unwrap();
    fs::write(&config, "[render\n").unwrap();

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not load config"));
}

#[test]
fn dump_ast_prints_json() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("page.eml");
    let output = dir.path().join("page.html");
    fs::write(&input, "h1 { Hello }").unwrap();

    cargo_bin_cmd!("emlc")
        .arg(&input)
        .arg(&output)
        .arg("--dump-ast")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"element\""))
        .stdout(predicate::str::contains("\"tag\": \"h1\""));

    assert_eq!(fs::read_to_string(&output).unwrap(), "<h1>Hello</h1>\n");
}
