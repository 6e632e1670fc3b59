//! One-shot import of the JSON configuration file used by older deployments.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::Result;
use crate::config::ConfigService;
use crate::domain::MeasurementConfig;

/// Suffix appended to the legacy file once it has been imported.
const MIGRATED_SUFFIX: &str = "migrated";

/// Default location of the legacy configuration file.
pub const DEFAULT_LEGACY_CONFIG_PATH: &str = "data/measurement_config.json";

fn migrated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(MIGRATED_SUFFIX);
    PathBuf::from(name)
}

/// Import a legacy configuration file into the database.
///
/// Returns `Ok(None)` when there is no file. On success the file is renamed
/// to `<name>.migrated` so it is not applied twice. The update goes through
/// [`ConfigService::replace_config`], so it is validated and reschedules
/// like any other change.
pub async fn import_legacy_config(
    service: &ConfigService,
    path: &Path,
) -> Result<Option<MeasurementConfig>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let legacy: MeasurementConfig = serde_json::from_str(&content)?;
    let saved = service.replace_config(legacy).await?;

    let target = migrated_path(path);
    if let Err(e) = tokio::fs::rename(path, &target).await {
        warn!(
            path = %path.display(),
            error = %e,
            "Imported legacy config but could not rename it"
        );
    }

    info!(
        path = %path.display(),
        frequency_minutes = saved.frequency_minutes,
        "Imported legacy measurement configuration"
    );
    Ok(Some(saved))
}
