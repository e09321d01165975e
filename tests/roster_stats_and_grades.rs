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
                "course": "Computer Science",
                "marks": marks,
                "contactInfo": "555-0102"
            }
        }),
    );
}

#[test]
fn stats_on_empty_roster_are_zeroed_with_null_extremes() {
    let workspace = temp_dir("studysync-stats-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let stats = request_ok(&mut stdin, &mut reader, "2", "roster.stats", json!({}));

    assert_eq!(stats["totalStudents"].as_u64(), Some(0));
    assert_eq!(stats["averageMarks"].as_f64(), Some(0.0));
    assert!(stats["highestScorer"].is_null());
    assert!(stats["lowestScorer"].is_null());
    for bucket in ["A", "B", "C", "F"] {
        assert_eq!(stats["gradeDistribution"][bucket].as_u64(), Some(0));
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn stats_average_extremes_and_distribution() {
    let workspace = temp_dir("studysync-stats-populated");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    add_student(&mut stdin, &mut reader, "2", "Asha", "CS001", 95.0);
    add_student(&mut stdin, &mut reader, "3", "Bela", "CS002", 70.0);
    add_student(&mut stdin, &mut reader, "4", "Chai", "CS003", 40.5);

    let stats = request_ok(&mut stdin, &mut reader, "5", "roster.stats", json!({}));
    assert_eq!(stats["totalStudents"].as_u64(), Some(3));
    // (95 + 70 + 40.5) / 3 = 68.5
    assert_eq!(stats["averageMarks"].as_f64(), Some(68.5));
    assert_eq!(stats["highestScorer"]["name"].as_str(), Some("Asha"));
    assert_eq!(stats["lowestScorer"]["name"].as_str(), Some("Chai"));
    assert_eq!(stats["gradeDistribution"]["A"].as_u64(), Some(1));
    assert_eq!(stats["gradeDistribution"]["B"].as_u64(), Some(0));
    assert_eq!(stats["gradeDistribution"]["C"].as_u64(), Some(1));
    assert_eq!(stats["gradeDistribution"]["F"].as_u64(), Some(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn grade_classification_boundaries() {
    let workspace = temp_dir("studysync-grade-bounds");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let cases: &[(f64, &str)] = &[
        (95.0, "A"),
        (90.0, "A"),
        (89.9, "B"),
        (75.0, "B"),
        (74.9, "C"),
        (50.0, "C"),
        (49.9, "F"),
        (0.0, "F"),
    ];
    for (i, (marks, expected)) in cases.iter().enumerate() {
        let graded = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "roster.grade",
            json!({ "marks": marks }),
        );
        assert_eq!(
            graded["grade"].as_str(),
            Some(*expected),
            "grade({})",
            marks
        );
    }

    drop(stdin);
    let _ = child.wait();
}
