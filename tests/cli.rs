use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Nothing listens on the discard port, so every lookup fails fast
const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn safetensors(payload_len: usize) -> Vec<u8> {
    let header = format!(
        r#"{{"lora_up.weight":{{"dtype":"U8","shape":[{}],"data_offsets":[0,{}]}}}}"#,
        payload_len, payload_len
    );
    let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend(std::iter::repeat(7u8).take(payload_len));
    bytes
}

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("loras")).unwrap();
        Self { dir }
    }

    fn lora(&self, name: &str, content: &[u8]) -> &Self {
        write_file(&self.dir.path().join("loras").join(name), content);
        self
    }

    fn cache(&self, json: &str) -> &Self {
        write_file(&self.cache_path(), json.as_bytes());
        self
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("loras_tags.json")
    }

    fn cache_json(&self) -> Value {
        let content = fs::read_to_string(self.cache_path()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("loratags"));
        cmd.env_remove("RUST_LOG")
            .arg("--loras-dir")
            .arg(self.dir.path().join("loras"))
            .arg("--cache-file")
            .arg(self.cache_path())
            .arg("--api-base")
            .arg(UNREACHABLE_API)
            .arg("--timeout-secs")
            .arg("5");
        cmd
    }
}

#[test]
fn list_sorts_case_insensitively() {
    let env = Env::new();
    env.lora("beta.safetensors", b"b")
        .lora("Alpha.safetensors", b"a")
        .lora("notes.txt", b"n");

    env.cmd()
        .arg("list")
        .arg("--with-none")
        .assert()
        .success()
        .stdout("None\nAlpha.safetensors\nbeta.safetensors\n");
}

#[test]
fn fetch_serves_cached_tags_without_lookup() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1", "t2"]}"#);

    env.cmd()
        .arg("fetch")
        .arg("--lora")
        .arg("a.safetensors")
        .assert()
        .success()
        .stdout("t1, t2\n");
}

#[test]
fn fetch_prompt_mode_with_header() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1", "t2"], "b.safetensors": ["t3"], "c.safetensors": []}"#);

    env.cmd()
        .arg("fetch")
        .arg("--mode")
        .arg("prompt")
        .arg("--prompt")
        .arg("x <lora:a> y <lora:c> <lora:b.safetensors>")
        .arg("--header")
        .assert()
        .success()
        .stdout("a.safetensors:\nt1\nt2\nb.safetensors:\nt3\n");
}

#[test]
fn fetch_print_tags_logs_to_stderr() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1"]}"#);

    env.cmd()
        .arg("fetch")
        .arg("--lora")
        .arg("a.safetensors")
        .arg("--print-tags")
        .assert()
        .success()
        .stdout("t1\n")
        .stderr(predicate::str::contains("Tags for a.safetensors: t1"));
}

#[test]
fn fetch_print_tags_survives_quiet() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1"]}"#)
        .lora("b.safetensors", b"weights");

    env.cmd()
        .arg("-q")
        .arg("fetch")
        .arg("--lora")
        .arg("a.safetensors")
        .arg("--print-tags")
        .assert()
        .success()
        .stderr(predicate::str::contains("Tags for a.safetensors: t1"));

    env.cmd()
        .arg("-q")
        .arg("fetch")
        .arg("--lora")
        .arg("b.safetensors")
        .assert()
        .success()
        .stderr(predicate::str::contains("Calculating hash").not());
}

#[test]
fn fetch_missing_file_leaves_cache_untouched() {
    let env = Env::new();
    let before = "{\"a.safetensors\": [\"t1\"]}";
    env.cache(before);

    env.cmd()
        .arg("fetch")
        .arg("--lora")
        .arg("ghost.safetensors")
        .assert()
        .success()
        .stdout("\n");

    assert_eq!(fs::read_to_string(env.cache_path()).unwrap(), before);
}

#[test]
fn fetch_unreachable_service_caches_empty_list() {
    let env = Env::new();
    env.lora("a.safetensors", b"weights");

    env.cmd()
        .arg("fetch")
        .arg("--lora")
        .arg("a.safetensors")
        .assert()
        .success()
        .stdout("\n");

    assert_eq!(env.cache_json(), serde_json::json!({"a.safetensors": []}));
}

#[test]
fn fetch_json_reports_origin() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1"]}"#);

    let assert = env
        .cmd()
        .arg("--format")
        .arg("json")
        .arg("fetch")
        .arg("--lora")
        .arg("a")
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

    assert_eq!(value["output"], "t1");
    assert_eq!(value["loras"][0]["name"], "a.safetensors");
    assert_eq!(value["loras"][0]["origin"], "cache");
}

#[test]
fn select_builds_stack_skipping_none() {
    let env = Env::new();

    env.cmd()
        .arg("select")
        .arg("A")
        .arg("None")
        .arg("C")
        .assert()
        .success()
        .stdout("[[\"A\",1.0,0.0],[\"C\",1.0,0.0]]\n");
}

#[test]
fn select_output_feeds_fetch_stack_mode() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1"], "b.safetensors": ["t2"]}"#);

    env.cmd()
        .arg("fetch")
        .arg("--mode")
        .arg("stack")
        .arg("--stack")
        .arg("-")
        .write_stdin("[[\"a.safetensors\",1.0,0.0],[\"b.safetensors\",1.0,0.0]]\n")
        .assert()
        .success()
        .stdout("t1\nt2\n");
}

#[test]
fn load_appends_cached_tags_to_prompt() {
    let env = Env::new();
    env.lora("a.safetensors", &safetensors(4))
        .cache(r#"{"a.safetensors": ["t1", "t2"]}"#);

    env.cmd()
        .arg("load")
        .arg("--lora")
        .arg("a.safetensors")
        .arg("--prompt")
        .arg("a portrait")
        .assert()
        .success()
        .stdout("a portrait, t1, t2\n");
}

#[test]
fn load_bypass_passes_prompt_through() {
    let env = Env::new();

    env.cmd()
        .arg("load")
        .arg("--lora")
        .arg("ghost.safetensors")
        .arg("--bypass")
        .arg("--prompt")
        .arg("a portrait")
        .assert()
        .success()
        .stdout("a portrait\n");

    assert!(!env.cache_path().exists());
}

#[test]
fn load_missing_file_fails() {
    let env = Env::new();

    env.cmd()
        .arg("load")
        .arg("--lora")
        .arg("ghost.safetensors")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost.safetensors"));
}

#[test]
fn hash_prints_sha256() {
    let env = Env::new();
    env.lora("a.safetensors", b"abc");

    env.cmd()
        .arg("hash")
        .arg("a.safetensors")
        .assert()
        .success()
        .stdout("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad  a.safetensors\n");
}

#[test]
fn cache_show_single_entry() {
    let env = Env::new();
    env.cache(r#"{"a.safetensors": ["t1", "t2"], "b.safetensors": []}"#);

    env.cmd()
        .arg("cache")
        .arg("show")
        .arg("a.safetensors")
        .assert()
        .success()
        .stdout("a.safetensors: t1, t2\n");

    env.cmd()
        .arg("cache")
        .arg("show")
        .arg("missing.safetensors")
        .assert()
        .failure();
}

#[test]
fn nodes_json_lists_three_nodes() {
    let env = Env::new();
    env.lora("a.safetensors", b"a");

    let assert = env
        .cmd()
        .arg("--format")
        .arg("json")
        .arg("nodes")
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

    let nodes = value["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
}

#[test]
fn connect_checks_slot_types() {
    let env = Env::new();

    env.cmd()
        .arg("connect")
        .arg("Lora Selector.lora_name_1")
        .arg("Fetch Lora Tags.lora_name")
        .assert()
        .success()
        .stdout(predicate::str::ends_with(": compatible\n"));

    env.cmd()
        .arg("connect")
        .arg("Lora Selector.lora_stack")
        .arg("LoraLoaderTagsQuery.clip")
        .assert()
        .failure()
        .stdout(predicate::str::contains("incompatible"));
}
