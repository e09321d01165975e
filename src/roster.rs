use crate::mirror::{keys, Mirror};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    pub course: String,
    pub marks: f64,
    pub contact_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A student as submitted by the form layer: the store assigns id and
/// timestamps.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    pub roll_no: String,
    pub course: String,
    pub marks: f64,
    pub contact_info: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_contact: Option<String>,
    #[serde(default)]
    pub admission_date: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    F,
}

impl Grade {
    pub fn letter(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        }
    }
}

/// Boundaries are inclusive on the lower bound of each bucket.
pub fn grade(marks: f64) -> Grade {
    if marks >= 90.0 {
        Grade::A
    } else if marks >= 75.0 {
        Grade::B
    } else if marks >= 50.0 {
        Grade::C
    } else {
        Grade::F
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Name,
    RollNo,
    Course,
    Marks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    #[serde(default)]
    pub search_term: String,
    /// "all" is the wildcard.
    #[serde(default = "default_course_filter")]
    pub course_filter: String,
    #[serde(default = "default_sort_by")]
    pub sort_by: SortBy,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

fn default_course_filter() -> String {
    "all".to_string()
}

fn default_sort_by() -> SortBy {
    SortBy::Name
}

fn default_sort_order() -> SortOrder {
    SortOrder::Asc
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "F")]
    pub f: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total_students: usize,
    pub average_marks: f64,
    pub highest_scorer: Option<Student>,
    pub lowest_scorer: Option<Student>,
    pub grade_distribution: GradeDistribution,
}

#[derive(Debug, Clone, Default)]
pub struct RosterState {
    pub students: Vec<Student>,
    pub filtered_students: Vec<Student>,
    pub error: Option<String>,
    pub dark_mode: bool,
}

#[derive(Debug, Clone)]
pub enum RosterAction {
    SetStudents(Vec<Student>),
    AddStudent(Student),
    UpdateStudent(Student),
    DeleteStudent(String),
    FilterStudents(Vec<Student>),
    SetError(Option<String>),
    ToggleDarkMode,
    ClearAll,
}

/// Pure transition function. All roster mutation funnels through here so
/// each applied action is a whole-state step.
pub fn reduce(mut state: RosterState, action: RosterAction) -> RosterState {
    match action {
        RosterAction::SetStudents(students) => {
            state.filtered_students = students.clone();
            state.students = students;
        }
        RosterAction::AddStudent(student) => {
            state.students.push(student);
            state.filtered_students = state.students.clone();
        }
        RosterAction::UpdateStudent(student) => {
            for existing in state.students.iter_mut() {
                if existing.id == student.id {
                    *existing = student.clone();
                }
            }
            state.filtered_students = state.students.clone();
        }
        RosterAction::DeleteStudent(id) => {
            state.students.retain(|s| s.id != id);
            state.filtered_students = state.students.clone();
        }
        RosterAction::FilterStudents(filtered) => {
            state.filtered_students = filtered;
        }
        RosterAction::SetError(error) => {
            state.error = error;
        }
        RosterAction::ToggleDarkMode => {
            state.dark_mode = !state.dark_mode;
        }
        RosterAction::ClearAll => {
            state.students.clear();
            state.filtered_students.clear();
        }
    }
    state
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    DuplicateRollNo,
}

pub struct RosterStore {
    state: RosterState,
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn apply_filters(students: &[Student], filters: &FilterOptions) -> Vec<Student> {
    let mut filtered: Vec<Student> = students.to_vec();

    let term = filters.search_term.trim().to_lowercase();
    if !term.is_empty() {
        filtered.retain(|s| {
            s.name.to_lowercase().contains(&term)
                || s.roll_no.to_lowercase().contains(&term)
                || s.course.to_lowercase().contains(&term)
        });
    }

    if filters.course_filter != "all" {
        filtered.retain(|s| s.course == filters.course_filter);
    }

    // Vec::sort_by is stable, so ties keep their original relative order.
    filtered.sort_by(|a, b| {
        let ord = match filters.sort_by {
            SortBy::Marks => a.marks.partial_cmp(&b.marks).unwrap_or(Ordering::Equal),
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::RollNo => a.roll_no.to_lowercase().cmp(&b.roll_no.to_lowercase()),
            SortBy::Course => a.course.to_lowercase().cmp(&b.course.to_lowercase()),
        };
        match filters.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    filtered
}

fn compute_stats(students: &[Student]) -> RosterStats {
    if students.is_empty() {
        return RosterStats {
            total_students: 0,
            average_marks: 0.0,
            highest_scorer: None,
            lowest_scorer: None,
            grade_distribution: GradeDistribution {
                a: 0,
                b: 0,
                c: 0,
                f: 0,
            },
        };
    }

    let total_marks: f64 = students.iter().map(|s| s.marks).sum();
    let average_marks = (total_marks / students.len() as f64 * 100.0).round() / 100.0;

    // Tie breaks match a stable descending sort over the original order:
    // first record among max-mark ties, last record among min-mark ties.
    let mut highest = &students[0];
    let mut lowest = &students[0];
    for s in &students[1..] {
        if s.marks > highest.marks {
            highest = s;
        }
        if s.marks <= lowest.marks {
            lowest = s;
        }
    }

    let mut dist = GradeDistribution {
        a: 0,
        b: 0,
        c: 0,
        f: 0,
    };
    for s in students {
        match grade(s.marks) {
            Grade::A => dist.a += 1,
            Grade::B => dist.b += 1,
            Grade::C => dist.c += 1,
            Grade::F => dist.f += 1,
        }
    }

    RosterStats {
        total_students: students.len(),
        average_marks,
        highest_scorer: Some(highest.clone()),
        lowest_scorer: Some(lowest.clone()),
        grade_distribution: dist,
    }
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

impl RosterStore {
    pub fn rehydrate(mirror: &Mirror) -> RosterStore {
        let mut store = RosterStore {
            state: RosterState::default(),
        };

        match mirror.get_json::<Vec<Student>>(keys::STUDENTS) {
            Ok(Some(students)) => store.dispatch(RosterAction::SetStudents(students)),
            Ok(None) => {}
            Err(e) => store.dispatch(RosterAction::SetError(Some(format!(
                "failed to load saved students: {}",
                e
            )))),
        }

        if let Ok(Some(saved)) = mirror.get_raw(keys::DARK_MODE) {
            if saved == "\"true\"" || saved == "true" {
                store.dispatch(RosterAction::ToggleDarkMode);
            }
        }

        store
    }

    pub fn state(&self) -> &RosterState {
        &self.state
    }

    fn dispatch(&mut self, action: RosterAction) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    fn mirror_students(&self, mirror: &Mirror) {
        // Fire-and-forget write-through; the in-memory set stays the source
        // of truth even if the mirror write fails.
        let _ = mirror.put_json(keys::STUDENTS, &self.state.students);
    }

    pub fn is_roll_no_unique(&self, roll_no: &str, exclude_id: Option<&str>) -> bool {
        !self
            .state
            .students
            .iter()
            .any(|s| s.roll_no == roll_no && Some(s.id.as_str()) != exclude_id)
    }

    pub fn add(&mut self, mirror: &Mirror, draft: NewStudent) -> Option<Student> {
        if !self.is_roll_no_unique(&draft.roll_no, None) {
            return None;
        }

        let now = now_iso();
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            roll_no: draft.roll_no,
            course: draft.course,
            marks: draft.marks,
            contact_info: draft.contact_info,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            date_of_birth: draft.date_of_birth,
            guardian_name: draft.guardian_name,
            guardian_contact: draft.guardian_contact,
            admission_date: draft.admission_date,
            blood_group: draft.blood_group,
            photo: draft.photo,
            created_at: now.clone(),
            updated_at: now,
        };

        self.dispatch(RosterAction::AddStudent(student.clone()));
        self.mirror_students(mirror);
        Some(student)
    }

    pub fn update(&mut self, mirror: &Mirror, mut student: Student) -> UpdateOutcome {
        if !self.state.students.iter().any(|s| s.id == student.id) {
            return UpdateOutcome::NotFound;
        }
        // Uniqueness is enforced here, not left to the form layer.
        if !self.is_roll_no_unique(&student.roll_no, Some(&student.id)) {
            return UpdateOutcome::DuplicateRollNo;
        }

        student.updated_at = now_iso();
        self.dispatch(RosterAction::UpdateStudent(student));
        self.mirror_students(mirror);
        UpdateOutcome::Updated
    }

    pub fn delete(&mut self, mirror: &Mirror, id: &str) {
        self.dispatch(RosterAction::DeleteStudent(id.to_string()));
        self.mirror_students(mirror);
    }

    pub fn apply_filter(&mut self, filters: &FilterOptions) {
        let filtered = apply_filters(&self.state.students, filters);
        self.dispatch(RosterAction::FilterStudents(filtered));
    }

    pub fn stats(&self) -> RosterStats {
        compute_stats(&self.state.students)
    }

    /// Serializes the full set (never the filtered view). Returns None on an
    /// empty roster so the caller can warn instead of writing an empty file.
    pub fn to_csv(&self) -> Option<String> {
        if self.state.students.is_empty() {
            return None;
        }

        let mut csv = String::from("Name,Roll No,Course,Marks,Grade,Contact Info\n");
        for s in &self.state.students {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                csv_quote(&s.name),
                csv_quote(&s.roll_no),
                csv_quote(&s.course),
                s.marks,
                grade(s.marks).letter(),
                csv_quote(&s.contact_info),
            ));
        }
        Some(csv)
    }

    /// Replace the whole set, e.g. from an imported snapshot.
    pub fn set_students(&mut self, mirror: &Mirror, students: Vec<Student>) {
        self.dispatch(RosterAction::SetStudents(students));
        self.mirror_students(mirror);
    }

    pub fn clear_all(&mut self, mirror: &Mirror) {
        self.dispatch(RosterAction::ClearAll);
        let _ = mirror.remove(keys::STUDENTS);
    }

    pub fn toggle_dark_mode(&mut self, mirror: &Mirror) -> bool {
        self.dispatch(RosterAction::ToggleDarkMode);
        let _ = mirror.put_raw(
            keys::DARK_MODE,
            if self.state.dark_mode {
                "\"true\""
            } else {
                "\"false\""
            },
        );
        self.state.dark_mode
    }
}
