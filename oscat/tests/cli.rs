use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn oscat(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("oscat").unwrap();
    cmd.arg("--root").arg(root).env_remove("OSCAT_ROOT").env_remove("RUST_LOG");
    cmd
}

fn init() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("store");
    oscat(&root).arg("init").assert().success();
    (tmp, root)
}

fn put(root: &Path, object_type: &str, content: &[u8]) -> String {
    let out = oscat(root)
        .args(["put", "--type", object_type, "-"])
        .write_stdin(content)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(out).unwrap().trim().to_string()
}

#[test]
fn test_init_and_type_size() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"hello world");

    oscat(&root)
        .args(["type", hash.as_str()])
        .assert()
        .success()
        .stdout("blob\n");
    oscat(&root)
        .args(["size", &hash[..10]])
        .assert()
        .success()
        .stdout("11\n");
}

#[test]
fn test_exists_exit_codes() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"present");

    oscat(&root)
        .args(["exists", hash.as_str()])
        .assert()
        .code(0)
        .stdout("")
        .stderr("");
    oscat(&root)
        .args(["exists", "0".repeat(64).as_str()])
        .assert()
        .code(1)
        .stdout("")
        .stderr("");
}

#[test]
fn test_fatal_errors_exit_128() {
    let (_tmp, root) = init();

    oscat(&root)
        .args(["show", "no-such-ref"])
        .assert()
        .code(128)
        .stderr(predicate::str::starts_with("fatal: "))
        .stderr(predicate::str::contains("Not a valid object name no-such-ref"));

    let hash = put(&root, "blob", b"content");
    oscat(&root)
        .args(["filters", hash.as_str()])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("must be <rev:path>"));
}

#[test]
fn test_missing_store_is_fatal() {
    let tmp = TempDir::new().unwrap();
    oscat(&tmp.path().join("absent"))
        .args(["show", "main"])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("Failed to open store"));
}

#[test]
fn test_root_from_environment() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"env");

    Command::cargo_bin("oscat")
        .unwrap()
        .env("OSCAT_ROOT", &root)
        .args(["show", hash.as_str()])
        .assert()
        .success()
        .stdout("env");
}

#[test]
fn test_add_refs_and_show_paths() {
    let (tmp, root) = init();
    let source = tmp.path().join("source");
    fs::create_dir_all(source.join("docs")).unwrap();
    fs::write(source.join("readme.txt"), "hello\n").unwrap();
    fs::write(source.join("docs/guide.md"), "guide\n").unwrap();

    oscat(&root)
        .arg("add")
        .arg(&source)
        .args(["--ref-name", "heads/main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created reference: heads/main"));

    oscat(&root)
        .args(["show", "main:readme.txt"])
        .assert()
        .success()
        .stdout("hello\n");
    oscat(&root)
        .args(["show", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("040000 tree "))
        .stdout(predicate::str::contains("\tdocs\n"))
        .stdout(predicate::str::contains("100644 blob "));
    oscat(&root)
        .args(["refs", "list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("heads/main -> "));
}

#[test]
fn test_refs_set_and_rm() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"tagged");

    oscat(&root)
        .args(["refs", "set", "tags/v1", &hash[..8]])
        .assert()
        .success()
        .stdout(format!("tags/v1 -> {}\n", hash));
    oscat(&root)
        .args(["show", "v1"])
        .assert()
        .success()
        .stdout("tagged");
    oscat(&root)
        .args(["refs", "rm", "tags/v1"])
        .assert()
        .success();
    oscat(&root).args(["show", "v1"]).assert().code(128);
}

#[test]
fn test_extract_through_tag() {
    let (_tmp, root) = init();
    let blob = put(&root, "blob", b"payload");
    let tag = put(
        &root,
        "tag",
        format!("object {}\ntype blob\ntag v1\n\nmsg\n", blob).as_bytes(),
    );

    oscat(&root)
        .args(["extract", "blob", tag.as_str()])
        .assert()
        .success()
        .stdout("payload");
    oscat(&root)
        .args(["extract", "tree", tag.as_str()])
        .assert()
        .code(128)
        .stderr(predicate::str::starts_with("fatal: "));
    oscat(&root)
        .args(["extract", "bogus", tag.as_str()])
        .assert()
        .failure();
}

#[test]
fn test_filters_and_textconv() {
    let (_tmp, root) = init();
    fs::write(root.join("attributes"), "*.txt eol=crlf\n").unwrap();
    let hash = put(&root, "blob", b"one\ntwo\n");

    oscat(&root)
        .args(["filters", "--path", "notes.txt", hash.as_str()])
        .assert()
        .success()
        .stdout("one\r\ntwo\r\n");
    oscat(&root)
        .args(["filters", "--path", "notes.md", hash.as_str()])
        .assert()
        .success()
        .stdout("one\ntwo\n");
    // No textconv driver: same as show.
    oscat(&root)
        .args(["textconv", "--path", "notes.txt", hash.as_str()])
        .assert()
        .success()
        .stdout("one\ntwo\n");
}

#[test]
fn test_unknown_type_flag() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"x");
    // Rewrite the type byte to a non-standard id.
    let object = root
        .join("objects/blake3-256")
        .join(&hash[..2])
        .join(&hash[2..]);
    let mut bytes = fs::read(&object).unwrap();
    bytes[5] = 9;
    fs::write(&object, bytes).unwrap();

    oscat(&root).args(["type", hash.as_str()]).assert().code(128);
    oscat(&root)
        .args(["type", "--allow-unknown-type", hash.as_str()])
        .assert()
        .success()
        .stdout("unknown-9\n");
}

#[test]
fn test_damaged_header_reported_as_corruption() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"x");
    let object = root
        .join("objects/blake3-256")
        .join(&hash[..2])
        .join(&hash[2..]);
    let mut bytes = fs::read(&object).unwrap();
    bytes[0..4].copy_from_slice(b"JUNK");
    fs::write(&object, bytes).unwrap();

    oscat(&root)
        .args(["size", hash.as_str()])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("Corrupted object"))
        .stderr(predicate::str::contains("Invalid hash").not());
}

#[test]
fn test_json_output() {
    let (_tmp, root) = init();
    let hash = put(&root, "blob", b"json");

    let out = oscat(&root)
        .args(["--json", "size", hash.as_str()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["size"], 4);
    assert_eq!(value["success"], true);

    let out = oscat(&root)
        .args(["--json", "type", hash.as_str()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["object_type"], "blob");

    let out = oscat(&root)
        .args(["--json", "exists", "f".repeat(64).as_str()])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["exists"], false);

    oscat(&root)
        .args(["--json", "show", "nope"])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("\"success\": false"));
}
