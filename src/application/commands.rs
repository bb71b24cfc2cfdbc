use crate::application::bootstrap::bootstrap_workspace;
use crate::application::license_gate::{load_license_state, LicenseGate};
use crate::application::share::{generate_shareable_url, load_snapshot, ShareUrlSync};
use crate::application::store::PlannerStore;
use crate::domain::license::{LicenseStatus, LicenseTier};
use crate::domain::models::{parse_iso_date, DateRange, EventGroup};
use crate::domain::ranges::{is_date_in_any_range, visible_dates};
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::SqliteKeyValueStore;
use crate::infrastructure::license_client::{LicenseValidator, ReqwestLicenseValidator};
use crate::infrastructure::state_codec::{decode_fragment, CodecError};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    plan_path: PathBuf,
    config: AppConfig,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            plan_path: bootstrap.plan_path,
            config: bootstrap.config,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.config.today(Utc::now())
    }

    pub fn kv_store(&self) -> Arc<SqliteKeyValueStore> {
        Arc::new(SqliteKeyValueStore::new(&self.database_path))
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub share_url: String,
    pub tier: LicenseTier,
    pub max_groups: usize,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDayResponse {
    pub date: NaiveDate,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LicenseStatusResponse {
    pub status: LicenseStatus,
    pub tier: LicenseTier,
    pub max_groups: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub start_date: Option<String>,
    pub include_weekends: Option<bool>,
    pub show_today: Option<bool>,
}

fn codec_error(error: CodecError) -> InfraError {
    InfraError::InvalidInput(format!("share state could not be encoded: {error}"))
}

fn parse_date_arg(value: &str, field: &str) -> Result<NaiveDate, InfraError> {
    parse_iso_date(value.trim())
        .ok_or_else(|| InfraError::InvalidInput(format!("{field} must be YYYY-MM-DD, got '{value}'")))
}

/// Groups are addressed by 1-based position because decoded ids are
/// regenerated on every load. `None` means the selected group, which after a
/// load is the first one.
fn group_id_at(snapshot: &Snapshot, position: Option<usize>) -> Result<String, InfraError> {
    match position {
        Some(0) => Err(InfraError::InvalidInput("group positions start at 1".to_string())),
        Some(position) => snapshot
            .groups
            .as_slice()
            .get(position - 1)
            .map(|group| group.id.clone())
            .ok_or_else(|| {
                InfraError::InvalidInput(format!(
                    "no group at position {position}; the plan has {} group(s)",
                    snapshot.groups.len()
                ))
            }),
        None => snapshot
            .selected_group()
            .or_else(|| snapshot.groups.first())
            .map(|group| group.id.clone())
            .ok_or_else(|| InfraError::InvalidInput("the plan has no groups".to_string())),
    }
}

fn read_plan_fragment(state: &AppState) -> Result<String, InfraError> {
    if !state.plan_path.exists() {
        return Ok(String::new());
    }
    Ok(fs::read_to_string(&state.plan_path)?.trim().to_string())
}

fn load_store(state: &AppState) -> Result<PlannerStore, InfraError> {
    let fragment = read_plan_fragment(state)?;
    let snapshot = decode_fragment(&fragment, state.today());
    let tier = load_license_state(state.kv_store().as_ref())?.tier();
    Ok(PlannerStore::new(snapshot, tier))
}

fn plan_response(state: &AppState, store: &PlannerStore) -> Result<PlanResponse, InfraError> {
    let url = generate_shareable_url(&state.config.share_base_url, store.snapshot()).map_err(codec_error)?;
    Ok(PlanResponse {
        share_url: url.to_string(),
        tier: store.tier(),
        max_groups: store.tier().max_groups(),
        snapshot: store.snapshot().clone(),
    })
}

/// Loads the persisted plan, applies `mutation`, and writes back the share
/// fragment produced by the store's subscriber. Nothing is written when the
/// mutation fails.
fn with_plan<R, F>(state: &AppState, mutation: F) -> Result<R, InfraError>
where
    F: FnOnce(&mut PlannerStore) -> Result<R, InfraError>,
{
    let mut store = load_store(state)?;
    let sync = ShareUrlSync::new(state.config.share_base_url.clone());
    sync.attach(&mut store);

    let result = mutation(&mut store)?;
    let fragment = sync
        .latest_fragment()
        .ok_or_else(|| InfraError::Storage("share state could not be encoded".to_string()))?;
    fs::write(&state.plan_path, format!("{fragment}\n"))?;
    Ok(result)
}

pub fn open_plan_impl(state: &AppState, input: String) -> Result<PlanResponse, InfraError> {
    let snapshot = load_snapshot(&input, state.today());
    let response = with_plan(state, |store| {
        store.replace(snapshot);
        plan_response(state, store)
    })?;
    state.log_info(
        "open_plan",
        &format!(
            "opened plan groups={} ranges={}",
            response.snapshot.groups.len(),
            response.snapshot.range_count()
        ),
    );
    Ok(response)
}

pub fn reset_plan_impl(state: &AppState) -> Result<PlanResponse, InfraError> {
    let snapshot = Snapshot::default_for(state.today());
    let response = with_plan(state, |store| {
        store.replace(snapshot);
        plan_response(state, store)
    })?;
    state.log_info("reset_plan", "replaced plan with default");
    Ok(response)
}

pub fn show_plan_impl(state: &AppState) -> Result<PlanResponse, InfraError> {
    let store = load_store(state)?;
    plan_response(state, &store)
}

pub fn share_url_impl(state: &AppState) -> Result<String, InfraError> {
    Ok(show_plan_impl(state)?.share_url)
}

pub fn calendar_impl(state: &AppState, covered_only: bool) -> Result<Vec<CalendarDayResponse>, InfraError> {
    let store = load_store(state)?;
    let snapshot = store.snapshot();
    let days = visible_dates(snapshot.start_date, snapshot.include_weekends)
        .into_iter()
        .map(|date| CalendarDayResponse {
            date,
            groups: snapshot
                .groups
                .iter()
                .filter(|group| is_date_in_any_range(date, group))
                .map(|group| group.name.clone())
                .collect(),
        })
        .filter(|day| !covered_only || !day.groups.is_empty())
        .collect();
    Ok(days)
}

pub fn add_group_impl(state: &AppState, name: String) -> Result<EventGroup, InfraError> {
    let group = with_plan(state, |store| {
        let group = store.add_group(&name);
        if group.is_sentinel() {
            return Err(InfraError::InvalidInput(format!(
                "group limit reached: the {} tier allows {} groups",
                store.tier().as_str(),
                store.tier().max_groups()
            )));
        }
        Ok(group)
    })?;
    state.log_info("add_group", &format!("added group name={}", group.name));
    Ok(group)
}

pub fn rename_group_impl(state: &AppState, position: usize, name: String) -> Result<PlanResponse, InfraError> {
    let response = with_plan(state, |store| {
        let group_id = group_id_at(store.snapshot(), Some(position))?;
        store.rename_group(&group_id, &name);
        plan_response(state, store)
    })?;
    state.log_info("rename_group", &format!("renamed group position={position}"));
    Ok(response)
}

pub fn delete_group_impl(state: &AppState, position: usize) -> Result<PlanResponse, InfraError> {
    let response = with_plan(state, |store| {
        let group_id = group_id_at(store.snapshot(), Some(position))?;
        store.delete_group(&group_id);
        plan_response(state, store)
    })?;
    state.log_info("delete_group", &format!("deleted group position={position}"));
    Ok(response)
}

pub fn toggle_date_impl(
    state: &AppState,
    position: Option<usize>,
    date: String,
) -> Result<PlanResponse, InfraError> {
    let date = parse_date_arg(&date, "date")?;
    let response = with_plan(state, |store| {
        let group_id = group_id_at(store.snapshot(), position)?;
        store.toggle_single_date(&group_id, date);
        plan_response(state, store)
    })?;
    state.log_info("toggle_date", &format!("toggled date={date}"));
    Ok(response)
}

/// Drag selection by default; `replace` switches to the keyboard selection,
/// which discards the group's other ranges.
pub fn paint_range_impl(
    state: &AppState,
    position: Option<usize>,
    anchor: String,
    pointer: String,
    replace: bool,
) -> Result<PlanResponse, InfraError> {
    let anchor = parse_date_arg(&anchor, "anchor")?;
    let pointer = parse_date_arg(&pointer, "pointer")?;
    let response = with_plan(state, |store| {
        let group_id = group_id_at(store.snapshot(), position)?;
        if replace {
            store.replace_ranges(&group_id, anchor, pointer);
        } else {
            store.paint_range(&group_id, anchor, pointer);
        }
        plan_response(state, store)
    })?;
    state.log_info(
        "paint_range",
        &format!("painted {anchor}..{pointer} replace={replace}"),
    );
    Ok(response)
}

pub fn delete_range_impl(
    state: &AppState,
    position: Option<usize>,
    start: String,
    end: String,
) -> Result<PlanResponse, InfraError> {
    let range = DateRange::new(parse_date_arg(&start, "start")?, parse_date_arg(&end, "end")?);
    let response = with_plan(state, |store| {
        let group_id = group_id_at(store.snapshot(), position)?;
        if !store.delete_range(&group_id, range) {
            return Err(InfraError::InvalidInput(format!(
                "range {}..{} not found",
                range.start, range.end
            )));
        }
        plan_response(state, store)
    })?;
    state.log_info("delete_range", &format!("deleted {}..{}", range.start, range.end));
    Ok(response)
}

pub fn update_settings_impl(state: &AppState, update: SettingsUpdate) -> Result<PlanResponse, InfraError> {
    let start_date = update
        .start_date
        .as_deref()
        .map(|value| parse_date_arg(value, "start_date"))
        .transpose()?;
    let response = with_plan(state, |store| {
        if let Some(date) = start_date {
            store.set_start_date(date);
        }
        if let Some(include) = update.include_weekends {
            store.set_include_weekends(include);
        }
        if let Some(show) = update.show_today {
            store.set_show_today(show);
        }
        plan_response(state, store)
    })?;
    state.log_info(
        "update_settings",
        &format!(
            "start_date={} include_weekends={} show_today={}",
            response.snapshot.start_date, response.snapshot.include_weekends, response.snapshot.show_today
        ),
    );
    Ok(response)
}

fn license_gate<V: LicenseValidator>(state: &AppState, validator: Arc<V>) -> LicenseGate<SqliteKeyValueStore, V> {
    LicenseGate::new(state.kv_store(), validator, state.config.instance_name.as_str())
}

fn reqwest_validator(state: &AppState) -> Arc<ReqwestLicenseValidator> {
    Arc::new(ReqwestLicenseValidator::new(state.config.license_endpoint.clone()))
}

fn status_response<V: LicenseValidator>(
    gate: &LicenseGate<SqliteKeyValueStore, V>,
    valid: Option<bool>,
) -> LicenseStatusResponse {
    let license = gate.state();
    LicenseStatusResponse {
        status: license.status(),
        tier: license.tier(),
        max_groups: license.tier().max_groups(),
        last_validated_at: license.last_validated_at.map(|value| value.to_rfc3339()),
        valid,
    }
}

pub async fn activate_license_impl(state: &AppState, key: String) -> Result<LicenseStatusResponse, InfraError> {
    activate_license_with(state, reqwest_validator(state), key).await
}

/// Validates before storing anything, so a rejected key leaves the current
/// key and tier as they were.
pub async fn activate_license_with<V: LicenseValidator>(
    state: &AppState,
    validator: Arc<V>,
    key: String,
) -> Result<LicenseStatusResponse, InfraError> {
    let gate = license_gate(state, validator);
    gate.restore()?;
    let valid = gate.validate(&key).await;
    state.log_info("activate_license", &format!("validation valid={valid}"));
    Ok(status_response(&gate, Some(valid)))
}

pub async fn license_status_impl(state: &AppState) -> Result<LicenseStatusResponse, InfraError> {
    license_status_with(state, reqwest_validator(state)).await
}

/// Reports the stored license, revalidating first when the last successful
/// validation is older than the configured age.
pub async fn license_status_with<V: LicenseValidator>(
    state: &AppState,
    validator: Arc<V>,
) -> Result<LicenseStatusResponse, InfraError> {
    let gate = license_gate(state, validator);
    let restored = gate.restore()?;

    let mut valid = None;
    if gate.should_revalidate(state.config.revalidate_after()) {
        if let Some(key) = restored.key.as_deref() {
            let result = gate.validate(key).await;
            state.log_info("license_status", &format!("revalidated valid={result}"));
            valid = Some(result);
        }
    }
    Ok(status_response(&gate, valid))
}

pub fn clear_license_impl(state: &AppState) -> Result<LicenseStatusResponse, InfraError> {
    let gate = license_gate(state, reqwest_validator(state));
    gate.restore()?;
    gate.clear()?;
    state.log_info("clear_license", "removed stored license");
    Ok(status_response(&gate, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::license::{FREE_MAX_GROUPS, PRO_MAX_GROUPS};
    use crate::infrastructure::kv_store::{KeyValueStore, LICENSE_KEY, LICENSE_VALIDATED_AT_KEY};
    use crate::infrastructure::license_client::LicenseValidationRequest;
    use async_trait::async_trait;
    use chrono::Datelike;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LICENSE: &str = "PCAL-1234-5678-9012-3456";

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "pocketcal-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[derive(Debug)]
    struct FakeLicenseValidator {
        active: bool,
        calls: AtomicUsize,
    }

    impl FakeLicenseValidator {
        fn new(active: bool) -> Self {
            Self {
                active,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LicenseValidator for FakeLicenseValidator {
        async fn validate(&self, _request: LicenseValidationRequest) -> Result<bool, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.active)
        }
    }

    fn ranges_of(response: &PlanResponse, position: usize) -> Vec<DateRange> {
        response.snapshot.groups.as_slice()[position - 1].ranges.clone()
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn bootstrap_creates_workspace_layout() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(state.config_dir().join("app.json").exists());
        assert!(state.database_path().exists());
        assert_eq!(state.config().share_base_url.as_str(), "https://pocketcal.com/");
    }

    #[test]
    fn fresh_workspace_shows_default_plan() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let plan = show_plan_impl(&state).expect("show plan");
        assert_eq!(plan.snapshot.groups.len(), 1);
        assert_eq!(plan.tier, LicenseTier::Free);
        assert_eq!(plan.max_groups, FREE_MAX_GROUPS);
        assert!(plan.share_url.starts_with("https://pocketcal.com/#"));
    }

    #[test]
    fn edits_persist_across_app_states() {
        let workspace = TempWorkspace::new();
        {
            let state = workspace.app_state();
            paint_range_impl(&state, None, "2026-10-10".to_string(), "2026-10-12".to_string(), false)
                .expect("paint range");
            add_group_impl(&state, "Travel".to_string()).expect("add group");
            toggle_date_impl(&state, Some(2), "2026-10-20".to_string()).expect("toggle date");
        }

        let state = workspace.app_state();
        let plan = show_plan_impl(&state).expect("show plan");
        assert_eq!(plan.snapshot.groups.len(), 2);
        assert_eq!(plan.snapshot.groups.as_slice()[1].name, "Travel");
        assert_eq!(
            ranges_of(&plan, 1),
            vec![DateRange::new(date("2026-10-10"), date("2026-10-12"))]
        );
        assert_eq!(ranges_of(&plan, 2), vec![DateRange::single(date("2026-10-20"))]);
    }

    #[test]
    fn open_plan_accepts_share_url_from_another_workspace() {
        let source = TempWorkspace::new();
        let source_state = source.app_state();
        paint_range_impl(&source_state, None, "2026-11-01".to_string(), "2026-11-03".to_string(), false)
            .expect("paint range");
        let url = share_url_impl(&source_state).expect("share url");

        let target = TempWorkspace::new();
        let target_state = target.app_state();
        let opened = open_plan_impl(&target_state, url.clone()).expect("open plan");
        assert_eq!(
            ranges_of(&opened, 1),
            vec![DateRange::new(date("2026-11-01"), date("2026-11-03"))]
        );
        assert_eq!(share_url_impl(&target_state).expect("share url"), url);
    }

    #[test]
    fn group_limit_is_enforced_for_free_tier() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        for index in 1..FREE_MAX_GROUPS {
            add_group_impl(&state, format!("Group {index}")).expect("add group");
        }
        let result = add_group_impl(&state, "One too many".to_string());
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
        assert_eq!(show_plan_impl(&state).expect("show plan").snapshot.groups.len(), FREE_MAX_GROUPS);
    }

    #[test]
    fn group_positions_are_validated() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(matches!(
            rename_group_impl(&state, 0, "Zero".to_string()),
            Err(InfraError::InvalidInput(_))
        ));
        assert!(matches!(
            delete_group_impl(&state, 3),
            Err(InfraError::InvalidInput(_))
        ));

        let renamed = rename_group_impl(&state, 1, "Holidays".to_string()).expect("rename group");
        assert_eq!(renamed.snapshot.groups.as_slice()[0].name, "Holidays");
        let deleted = delete_group_impl(&state, 1).expect("delete group");
        assert!(deleted.snapshot.groups.is_empty());
        assert!(matches!(
            toggle_date_impl(&state, None, "2026-10-20".to_string()),
            Err(InfraError::InvalidInput(_))
        ));
    }

    #[test]
    fn replace_and_delete_range_commands() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        paint_range_impl(&state, None, "2026-10-01".to_string(), "2026-10-03".to_string(), false)
            .expect("paint range");
        let replaced = paint_range_impl(&state, None, "2026-10-09".to_string(), "2026-10-07".to_string(), true)
            .expect("replace ranges");
        assert_eq!(
            ranges_of(&replaced, 1),
            vec![DateRange::new(date("2026-10-07"), date("2026-10-09"))]
        );

        assert!(matches!(
            delete_range_impl(&state, None, "2026-10-01".to_string(), "2026-10-03".to_string()),
            Err(InfraError::InvalidInput(_))
        ));
        let deleted = delete_range_impl(&state, None, "2026-10-09".to_string(), "2026-10-07".to_string())
            .expect("delete range");
        assert!(ranges_of(&deleted, 1).is_empty());
    }

    #[test]
    fn settings_update_and_calendar_listing() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let updated = update_settings_impl(
            &state,
            SettingsUpdate {
                start_date: Some("2027-02-14".to_string()),
                include_weekends: Some(false),
                show_today: Some(false),
            },
        )
        .expect("update settings");
        assert_eq!(updated.snapshot.start_date, date("2027-02-01"));
        assert!(!updated.snapshot.include_weekends);
        assert!(!updated.snapshot.show_today);

        toggle_date_impl(&state, None, "2027-02-15".to_string()).expect("toggle date");
        let covered = calendar_impl(&state, true).expect("calendar");
        assert_eq!(
            covered,
            vec![CalendarDayResponse {
                date: date("2027-02-15"),
                groups: vec!["My Events".to_string()],
            }]
        );

        let all_days = calendar_impl(&state, false).expect("calendar");
        assert!(all_days
            .iter()
            .all(|day| day.date.weekday().number_from_monday() <= 5));
    }

    #[test]
    fn invalid_date_argument_is_rejected() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(matches!(
            toggle_date_impl(&state, None, "next tuesday".to_string()),
            Err(InfraError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn activation_unlocks_pro_group_limit() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let validator = Arc::new(FakeLicenseValidator::new(true));

        let status = activate_license_with(&state, Arc::clone(&validator), LICENSE.to_string())
            .await
            .expect("activate license");
        assert_eq!(status.valid, Some(true));
        assert_eq!(status.status, LicenseStatus::ProActive);
        assert_eq!(status.max_groups, PRO_MAX_GROUPS);

        for index in 1..PRO_MAX_GROUPS {
            add_group_impl(&state, format!("Group {index}")).expect("add group");
        }
        assert!(add_group_impl(&state, "Over".to_string()).is_err());
    }

    #[tokio::test]
    async fn rejected_activation_stores_nothing() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let status = activate_license_with(&state, Arc::new(FakeLicenseValidator::new(false)), LICENSE.to_string())
            .await
            .expect("activate license");
        assert_eq!(status.valid, Some(false));
        assert_eq!(status.status, LicenseStatus::NoKey);
        assert_eq!(status.tier, LicenseTier::Free);
        assert_eq!(state.kv_store().get(LICENSE_KEY).expect("get key"), None);
    }

    #[tokio::test]
    async fn rejected_activation_keeps_active_pro_license() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        activate_license_with(&state, Arc::new(FakeLicenseValidator::new(true)), LICENSE.to_string())
            .await
            .expect("activate license");

        let mistyped = "PCAL-1234-5678-9012-3457".to_string();
        let status = activate_license_with(&state, Arc::new(FakeLicenseValidator::new(false)), mistyped)
            .await
            .expect("activate mistyped license");
        assert_eq!(status.valid, Some(false));
        assert_eq!(status.tier, LicenseTier::Pro);
        assert_eq!(status.status, LicenseStatus::ProActive);
        assert_eq!(state.kv_store().get(LICENSE_KEY).expect("get key"), Some(LICENSE.to_string()));
        assert!(state
            .kv_store()
            .get(LICENSE_VALIDATED_AT_KEY)
            .expect("get timestamp")
            .is_some());
        assert_eq!(show_plan_impl(&state).expect("show plan").tier, LicenseTier::Pro);
    }

    #[tokio::test]
    async fn status_revalidates_only_stale_licenses() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let store = state.kv_store();
        store.set(LICENSE_KEY, LICENSE).expect("seed key");
        store
            .set(LICENSE_VALIDATED_AT_KEY, &(Utc::now() - chrono::Duration::days(1)).to_rfc3339())
            .expect("seed timestamp");

        let validator = Arc::new(FakeLicenseValidator::new(true));
        let fresh = license_status_with(&state, Arc::clone(&validator)).await.expect("status");
        assert_eq!(fresh.valid, None);
        assert_eq!(fresh.tier, LicenseTier::Pro);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);

        store
            .set(LICENSE_VALIDATED_AT_KEY, &(Utc::now() - chrono::Duration::days(30)).to_rfc3339())
            .expect("age timestamp");
        let stale = license_status_with(&state, Arc::clone(&validator)).await.expect("status");
        assert_eq!(stale.valid, Some(true));
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_revalidation_keeps_pro_tier() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let store = state.kv_store();
        store.set(LICENSE_KEY, LICENSE).expect("seed key");
        store
            .set(LICENSE_VALIDATED_AT_KEY, &(Utc::now() - chrono::Duration::days(30)).to_rfc3339())
            .expect("seed timestamp");

        let status = license_status_with(&state, Arc::new(FakeLicenseValidator::new(false)))
            .await
            .expect("status");
        assert_eq!(status.valid, Some(false));
        assert_eq!(status.tier, LicenseTier::Pro);
    }

    #[test]
    fn clear_license_returns_to_free_tier() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let store = state.kv_store();
        store.set(LICENSE_KEY, LICENSE).expect("seed key");
        store
            .set(LICENSE_VALIDATED_AT_KEY, &Utc::now().to_rfc3339())
            .expect("seed timestamp");

        let status = clear_license_impl(&state).expect("clear license");
        assert_eq!(status.status, LicenseStatus::NoKey);
        assert_eq!(show_plan_impl(&state).expect("show plan").tier, LicenseTier::Free);
    }

    #[test]
    fn command_errors_are_logged() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let message = state.command_error("toggle_date", &InfraError::InvalidInput("bad date".to_string()));
        assert!(message.contains("bad date"));
        let log = fs::read_to_string(workspace.path.join("logs").join("commands.log")).expect("read log");
        assert!(log.contains("\"level\":\"error\""));
        assert!(log.contains("toggle_date"));
    }
}
