use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_studysyncd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn studysyncd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn add_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    roll_no: &str,
    course: &str,
    marks: f64,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "roster.add",
        json!({
            "student": {
                "name": name,
                "rollNo": roll_no,
                "course": course,
                "marks": marks,
                "contactInfo": "555-0103"
            }
        }),
    );
}

fn filtered_names(result: &serde_json::Value) -> Vec<String> {
    result["filteredStudents"]
        .as_array()
        .expect("filteredStudents")
        .iter()
        .map(|s| s["name"].as_str().expect("name").to_string())
        .collect()
}

#[test]
fn search_term_matches_substrings_case_insensitively() {
    let workspace = temp_dir("studysync-filter-search");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    add_student(&mut stdin, &mut reader, "2", "CS101", "r1", "Computer Science", 80.0);
    add_student(&mut stdin, &mut reader, "3", "Math201", "r2", "Mathematics", 75.0);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "roster.filter",
        json!({ "searchTerm": "cs" }),
    );
    assert_eq!(filtered_names(&result), vec!["CS101"]);

    // The full set is untouched; only the derived view narrows.
    let listed = request_ok(&mut stdin, &mut reader, "5", "roster.list", json!({}));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(
        listed["filteredStudents"].as_array().map(|a| a.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn course_selector_and_sorting_compose() {
    let workspace = temp_dir("studysync-filter-sort");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    add_student(&mut stdin, &mut reader, "2", "Asha", "r1", "Physics", 60.0);
    add_student(&mut stdin, &mut reader, "3", "Bela", "r2", "Physics", 90.0);
    add_student(&mut stdin, &mut reader, "4", "Chai", "r3", "Chemistry", 99.0);

    let by_marks_desc = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.filter",
        json!({ "courseFilter": "Physics", "sortBy": "marks", "sortOrder": "desc" }),
    );
    assert_eq!(filtered_names(&by_marks_desc), vec!["Bela", "Asha"]);

    // Wildcard course, case-insensitive name sort.
    let by_name = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "roster.filter",
        json!({ "courseFilter": "all", "sortBy": "name", "sortOrder": "asc" }),
    );
    assert_eq!(filtered_names(&by_name), vec!["Asha", "Bela", "Chai"]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn mutations_reset_the_filtered_view_to_the_full_set() {
    let workspace = temp_dir("studysync-filter-reset");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    add_student(&mut stdin, &mut reader, "2", "Asha", "r1", "Physics", 60.0);
    add_student(&mut stdin, &mut reader, "3", "Bela", "r2", "Chemistry", 90.0);

    let narrowed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "roster.filter",
        json!({ "searchTerm": "asha" }),
    );
    assert_eq!(filtered_names(&narrowed).len(), 1);

    // A fresh add resets the view; callers re-apply filters if they want them.
    add_student(&mut stdin, &mut reader, "5", "Chai", "r3", "Physics", 70.0);
    let listed = request_ok(&mut stdin, &mut reader, "6", "roster.list", json!({}));
    assert_eq!(
        listed["filteredStudents"].as_array().map(|a| a.len()),
        Some(3)
    );

    drop(stdin);
    let _ = child.wait();
}
