use std::fs;

use record_sink::{append, AppendSink, JsonLinesSink, MemorySink, OpenMode};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Line {
    url: String,
    total_entries: u64,
}

#[test]
fn lines_are_appended_across_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/sites.json");

    {
        let mut sink = JsonLinesSink::open(&path, OpenMode::Append).unwrap();
        append(
            &mut sink,
            &Line {
                url: "http://a.test/".into(),
                total_entries: 3,
            },
        )
        .unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.lines(), 1);
    }
    {
        let mut sink = JsonLinesSink::open(&path, OpenMode::Append).unwrap();
        sink.append_json(&json!({"url": "http://b.test/"})).unwrap();
        sink.flush().unwrap();
    }

    let raw = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], r#"{"url":"http://a.test/","totalEntries":3}"#);
    assert_eq!(lines[1], r#"{"url":"http://b.test/"}"#);
}

#[test]
fn fresh_mode_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");
    fs::write(&path, "{\"old\":true}\n").unwrap();

    let mut sink = JsonLinesSink::open(&path, OpenMode::Fresh).unwrap();
    sink.append_json(&json!({"new": true})).unwrap();
    sink.flush().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"new\":true}\n");
}

#[test]
fn flushed_lines_survive_without_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sites.json");
    let mut sink = JsonLinesSink::open(&path, OpenMode::Append).unwrap();
    sink.append_json(&json!({"page": 1})).unwrap();
    sink.flush().unwrap();

    // the handle is still alive; the flushed line is already on disk
    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"page\":1}\n");
    drop(sink);
}

#[test]
fn boxed_memory_sink_shares_its_buffer() {
    let memory = MemorySink::new();
    let mut boxed: Box<dyn AppendSink> = Box::new(memory.clone());
    append(&mut boxed, &json!({"a": 1})).unwrap();
    append(&mut boxed, &json!({"b": 2})).unwrap();
    assert_eq!(memory.flushed(), 0);
    boxed.flush().unwrap();

    assert_eq!(memory.lines().len(), 2);
    assert_eq!(memory.flushed(), 2);
}

#[test]
fn discarded_lines_never_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sites.json");
    {
        let mut sink = JsonLinesSink::open(&path, OpenMode::Append).unwrap();
        sink.append_json(&json!({"page": 1})).unwrap();
        sink.flush().unwrap();

        sink.append_json(&json!({"page": 2, "half": true})).unwrap();
        assert_eq!(sink.pending_lines(), 1);
        sink.discard();
        assert_eq!(sink.pending_lines(), 0);
        assert_eq!(sink.lines(), 1);
    }
    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"page\":1}\n");
}

#[test]
fn unflushed_lines_are_written_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");
    {
        let mut sink = JsonLinesSink::open(&path, OpenMode::Append).unwrap();
        sink.append_json(&json!({"late": true})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"late\":true}\n");
}

#[test]
fn memory_sink_discard_keeps_flushed_lines() {
    let mut memory = MemorySink::new();
    memory.append_json(&json!({"a": 1})).unwrap();
    memory.flush().unwrap();
    memory.append_json(&json!({"b": 2})).unwrap();
    memory.discard();
    assert_eq!(memory.lines(), vec![json!({"a": 1})]);
}
