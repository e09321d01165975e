use crate::identity::{IdentityService, Role};
use crate::mirror::{keys, Mirror};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: String,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Hi,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub theme: Theme,
    pub language: Language,
    pub items_per_page: u32,
    pub email_notifications: bool,
    pub auto_backup: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            theme: Theme::Light,
            language: Language::En,
            items_per_page: 10,
            email_notifications: true,
            auto_backup: false,
        }
    }
}

/// Partial settings document; only supplied keys are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub items_per_page: Option<u32>,
    #[serde(default)]
    pub email_notifications: Option<bool>,
    #[serde(default)]
    pub auto_backup: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub attendance_records: Vec<AttendanceRecord>,
    pub notifications: Vec<Notification>,
    pub settings: AppSettings,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            user: None,
            is_authenticated: false,
            is_loading: false,
            attendance_records: Vec::new(),
            notifications: Vec::new(),
            settings: AppSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionAction {
    SetLoading(bool),
    SignedIn(User),
    SignedOut,
    SetAttendance(Vec<AttendanceRecord>),
    AddAttendance(AttendanceRecord),
    UpdateAttendance(AttendanceRecord),
    SetNotifications(Vec<Notification>),
    AddNotification(Notification),
    MarkNotificationRead(String),
    ClearNotifications,
    SetSettings(AppSettings),
    MergeSettings(SettingsPatch),
}

pub fn reduce(mut state: SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::SetLoading(loading) => {
            state.is_loading = loading;
        }
        SessionAction::SignedIn(user) => {
            state.user = Some(user);
            state.is_authenticated = true;
            state.is_loading = false;
        }
        SessionAction::SignedOut => {
            state.user = None;
            state.is_authenticated = false;
        }
        SessionAction::SetAttendance(records) => {
            state.attendance_records = records;
        }
        SessionAction::AddAttendance(record) => {
            state.attendance_records.push(record);
        }
        SessionAction::UpdateAttendance(record) => {
            for existing in state.attendance_records.iter_mut() {
                if existing.id == record.id {
                    *existing = record.clone();
                }
            }
        }
        SessionAction::SetNotifications(notifications) => {
            state.notifications = notifications;
        }
        SessionAction::AddNotification(notification) => {
            // Newest first.
            state.notifications.insert(0, notification);
        }
        SessionAction::MarkNotificationRead(id) => {
            for n in state.notifications.iter_mut() {
                if n.id == id {
                    n.read = true;
                }
            }
        }
        SessionAction::ClearNotifications => {
            state.notifications.clear();
        }
        SessionAction::SetSettings(settings) => {
            state.settings = settings;
        }
        SessionAction::MergeSettings(patch) => {
            if let Some(theme) = patch.theme {
                state.settings.theme = theme;
            }
            if let Some(language) = patch.language {
                state.settings.language = language;
            }
            if let Some(items) = patch.items_per_page {
                state.settings.items_per_page = items;
            }
            if let Some(email) = patch.email_notifications {
                state.settings.email_notifications = email;
            }
            if let Some(auto) = patch.auto_backup {
                state.settings.auto_backup = auto;
            }
        }
    }
    state
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn today_string() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Upsert decision for the one-record-per-(student, day) invariant: an
/// existing record keeps its id, a new one gets a fresh uuid.
fn attendance_record_for(
    records: &[AttendanceRecord],
    student_id: &str,
    date: &str,
    status: AttendanceStatus,
    remarks: Option<String>,
) -> (AttendanceRecord, bool) {
    let existing = records
        .iter()
        .find(|r| r.student_id == student_id && r.date == date);
    let record = AttendanceRecord {
        id: existing
            .map(|r| r.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        student_id: student_id.to_string(),
        date: date.to_string(),
        status,
        remarks,
    };
    (record, existing.is_some())
}

pub fn attendance_percentage(records: &[AttendanceRecord], student_id: &str) -> u32 {
    let student_records: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| r.student_id == student_id)
        .collect();
    if student_records.is_empty() {
        return 0;
    }
    let present = student_records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();
    (present as f64 / student_records.len() as f64 * 100.0).round() as u32
}

pub struct SessionStore {
    state: SessionState,
}

impl SessionStore {
    pub fn rehydrate(mirror: &Mirror) -> SessionStore {
        let mut store = SessionStore {
            state: SessionState::default(),
        };

        if let Ok(Some(records)) =
            mirror.get_json::<Vec<AttendanceRecord>>(keys::ATTENDANCE_RECORDS)
        {
            store.dispatch(SessionAction::SetAttendance(records));
        }
        if let Ok(Some(notifications)) = mirror.get_json::<Vec<Notification>>(keys::NOTIFICATIONS)
        {
            store.dispatch(SessionAction::SetNotifications(notifications));
        }
        if let Ok(Some(settings)) = mirror.get_json::<AppSettings>(keys::APP_SETTINGS) {
            store.dispatch(SessionAction::SetSettings(settings));
        }

        store
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn dispatch(&mut self, action: SessionAction) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    fn mirror_attendance(&self, mirror: &Mirror) {
        let _ = mirror.put_json(keys::ATTENDANCE_RECORDS, &self.state.attendance_records);
    }

    fn mirror_notifications(&self, mirror: &Mirror) {
        let _ = mirror.put_json(keys::NOTIFICATIONS, &self.state.notifications);
    }

    fn mirror_settings(&self, mirror: &Mirror) {
        let _ = mirror.put_json(keys::APP_SETTINGS, &self.state.settings);
    }

    /// Restore a provider-side session, if one survived the restart.
    pub fn restore_session(&mut self, identity: &dyn IdentityService) {
        if let Some(found) = identity.current_session() {
            let role = if identity.has_role(&found.user_id, "admin") {
                Role::Admin
            } else {
                Role::Student
            };
            self.dispatch(SessionAction::SignedIn(User {
                id: found.user_id,
                email: found.email,
                name: found.name,
                role,
                created_at: found.created_at,
            }));
        }
    }

    /// Delegates the credential check to the identity service; every failure
    /// degrades to an error notification and `false`. The loading flag is
    /// cleared on both exits.
    pub fn sign_in(
        &mut self,
        identity: &mut dyn IdentityService,
        mirror: &Mirror,
        email: &str,
        password: &str,
        user_agent: &str,
    ) -> bool {
        self.dispatch(SessionAction::SetLoading(true));

        let outcome = match identity.sign_in(email, password) {
            Ok(found) => {
                let is_admin = identity.has_role(&found.user_id, "admin");
                let role = if is_admin { Role::Admin } else { Role::Student };
                // Audit only; a failed login log must never fail the login.
                let _ = identity.record_login_attempt(
                    Some(&found.user_id),
                    email,
                    if is_admin { "admin" } else { "user" },
                    user_agent,
                );

                self.dispatch(SessionAction::SignedIn(User {
                    id: found.user_id,
                    email: found.email,
                    name: found.name,
                    role,
                    created_at: found.created_at,
                }));
                self.add_notification(
                    mirror,
                    "Welcome Back!",
                    "Hello, you have successfully logged in.",
                    NotificationKind::Success,
                );
                true
            }
            Err(e) => {
                self.add_notification(
                    mirror,
                    "Login Failed",
                    &e.to_string(),
                    NotificationKind::Error,
                );
                false
            }
        };

        self.dispatch(SessionAction::SetLoading(false));
        outcome
    }

    /// Creates the account but does not authenticate it.
    pub fn sign_up(
        &mut self,
        identity: &mut dyn IdentityService,
        mirror: &Mirror,
        name: &str,
        email: &str,
        password: &str,
        role: Option<Role>,
        user_agent: &str,
    ) -> bool {
        match identity.sign_up(email, password, name, role) {
            Ok(created) => {
                let _ = identity.record_login_attempt(
                    Some(&created.user_id),
                    email,
                    "user",
                    user_agent,
                );
                self.add_notification(
                    mirror,
                    "Registration Successful",
                    "Account created successfully. You can now login.",
                    NotificationKind::Success,
                );
                true
            }
            Err(e) => {
                self.add_notification(
                    mirror,
                    "Registration Failed",
                    &e.to_string(),
                    NotificationKind::Error,
                );
                false
            }
        }
    }

    pub fn sign_out(&mut self, identity: &mut dyn IdentityService, mirror: &Mirror) {
        let _ = identity.sign_out();
        self.dispatch(SessionAction::SignedOut);
        self.add_notification(
            mirror,
            "Logged Out",
            "You have been successfully logged out.",
            NotificationKind::Info,
        );
    }

    pub fn mark_attendance(
        &mut self,
        mirror: &Mirror,
        student_id: &str,
        status: AttendanceStatus,
        remarks: Option<String>,
    ) -> AttendanceRecord {
        self.mark_attendance_on(mirror, student_id, &today_string(), status, remarks)
    }

    pub fn mark_attendance_on(
        &mut self,
        mirror: &Mirror,
        student_id: &str,
        date: &str,
        status: AttendanceStatus,
        remarks: Option<String>,
    ) -> AttendanceRecord {
        let (record, existing) = attendance_record_for(
            &self.state.attendance_records,
            student_id,
            date,
            status,
            remarks,
        );
        if existing {
            self.dispatch(SessionAction::UpdateAttendance(record.clone()));
        } else {
            self.dispatch(SessionAction::AddAttendance(record.clone()));
        }
        self.mirror_attendance(mirror);

        self.add_notification(
            mirror,
            "Attendance Updated",
            &format!("Attendance marked as {} for today.", status.as_str()),
            NotificationKind::Success,
        );
        record
    }

    pub fn attendance_percentage(&self, student_id: &str) -> u32 {
        attendance_percentage(&self.state.attendance_records, student_id)
    }

    pub fn set_attendance(&mut self, mirror: &Mirror, records: Vec<AttendanceRecord>) {
        self.dispatch(SessionAction::SetAttendance(records));
        self.mirror_attendance(mirror);
    }

    pub fn add_notification(
        &mut self,
        mirror: &Mirror,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            message: message.to_string(),
            kind,
            timestamp: now_iso(),
            read: false,
        };
        self.dispatch(SessionAction::AddNotification(notification.clone()));
        self.mirror_notifications(mirror);
        notification
    }

    pub fn mark_notification_read(&mut self, mirror: &Mirror, id: &str) {
        self.dispatch(SessionAction::MarkNotificationRead(id.to_string()));
        self.mirror_notifications(mirror);
    }

    pub fn clear_notifications(&mut self, mirror: &Mirror) {
        self.dispatch(SessionAction::ClearNotifications);
        self.mirror_notifications(mirror);
    }

    pub fn update_settings(&mut self, mirror: &Mirror, patch: SettingsPatch) {
        self.merge_settings(mirror, patch);
        self.add_notification(
            mirror,
            "Settings Updated",
            "Your preferences have been saved.",
            NotificationKind::Success,
        );
    }

    /// Merge without the confirmation notification; used by snapshot import.
    pub fn merge_settings(&mut self, mirror: &Mirror, patch: SettingsPatch) {
        self.dispatch(SessionAction::MergeSettings(patch));
        self.mirror_settings(mirror);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(student_id: &str, date: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            date: date.to_string(),
            status,
            remarks: None,
        }
    }

    #[test]
    fn attendance_upsert_reuses_id_for_same_student_and_day() {
        let first = record("s1", "2025-03-10", AttendanceStatus::Present);
        let records = vec![first.clone()];
        let (second, existing) = attendance_record_for(
            &records,
            "s1",
            "2025-03-10",
            AttendanceStatus::Late,
            None,
        );
        assert!(existing);
        assert_eq!(second.id, first.id);
        assert_eq!(second.status, AttendanceStatus::Late);
    }

    #[test]
    fn attendance_upsert_makes_new_record_for_other_day() {
        let records = vec![record("s1", "2025-03-10", AttendanceStatus::Present)];
        let (next, existing) = attendance_record_for(
            &records,
            "s1",
            "2025-03-11",
            AttendanceStatus::Present,
            None,
        );
        assert!(!existing);
        assert_ne!(next.id, records[0].id);
    }

    #[test]
    fn attendance_percentage_rounds_to_nearest_integer() {
        let records = vec![
            record("s1", "2025-03-10", AttendanceStatus::Present),
            record("s1", "2025-03-11", AttendanceStatus::Present),
            record("s1", "2025-03-12", AttendanceStatus::Absent),
            record("s2", "2025-03-12", AttendanceStatus::Absent),
        ];
        // round(2/3 * 100) = 67
        assert_eq!(attendance_percentage(&records, "s1"), 67);
        assert_eq!(attendance_percentage(&records, "s2"), 0);
        assert_eq!(attendance_percentage(&records, "missing"), 0);
    }

    #[test]
    fn reduce_merge_settings_touches_only_supplied_keys() {
        let state = SessionState::default();
        let patch = SettingsPatch {
            theme: Some(Theme::Dark),
            items_per_page: Some(25),
            ..SettingsPatch::default()
        };
        let state = reduce(state, SessionAction::MergeSettings(patch));
        assert_eq!(state.settings.theme, Theme::Dark);
        assert_eq!(state.settings.items_per_page, 25);
        assert_eq!(state.settings.language, Language::En);
        assert!(state.settings.email_notifications);
        assert!(!state.settings.auto_backup);
    }

    #[test]
    fn reduce_add_notification_prepends() {
        let state = SessionState::default();
        let older = Notification {
            id: "old".to_string(),
            title: "t".to_string(),
            message: "m".to_string(),
            kind: NotificationKind::Info,
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            read: false,
        };
        let newer = Notification {
            id: "new".to_string(),
            ..older.clone()
        };
        let state = reduce(state, SessionAction::AddNotification(older));
        let state = reduce(state, SessionAction::AddNotification(newer));
        assert_eq!(state.notifications[0].id, "new");
        assert_eq!(state.notifications[1].id, "old");
    }

    #[test]
    fn reduce_signed_out_keeps_feed_and_settings() {
        let mut state = SessionState::default();
        state.user = Some(User {
            id: "u1".to_string(),
            email: "a@b.c".to_string(),
            name: "A".to_string(),
            role: Role::Student,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        });
        state.is_authenticated = true;
        let state = reduce(state, SessionAction::SignedOut);
        assert!(state.user.is_none());
        assert!(!state.is_authenticated);
        assert_eq!(state.settings, AppSettings::default());
    }
}
