//! Template files.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{PublishError, PublishResult};

/// Locations of the three monitoring templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePaths {
    pub agent_config: PathBuf,
    pub dashboard: PathBuf,
    pub alarms: PathBuf,
}

/// Parsed monitoring templates, not yet rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringTemplates {
    pub agent_config: Value,
    pub dashboard: Vec<Value>,
    pub alarms: Vec<Value>,
}

impl MonitoringTemplates {
    /// Read and parse all three templates.
    pub fn load(paths: &TemplatePaths) -> PublishResult<Self> {
        Ok(Self {
            agent_config: read_json(&paths.agent_config)?,
            dashboard: read_items(&paths.dashboard)?,
            alarms: read_items(&paths.alarms)?,
        })
    }
}

fn read_json(path: &Path) -> PublishResult<Value> {
    let contents = std::fs::read_to_string(path).map_err(|source| PublishError::TemplateRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| PublishError::TemplateParse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_items(path: &Path) -> PublishResult<Vec<Value>> {
    match read_json(path)? {
        Value::Array(items) => Ok(items),
        _ => Err(PublishError::TemplateShape {
            path: path.to_path_buf(),
        }),
    }
}
