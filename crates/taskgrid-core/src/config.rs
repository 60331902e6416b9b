use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::calendar::ViewMode;
use crate::datetime::parse_timezone;

const CONFIG_FILE_NAME: &str =
  "taskgrid.toml";
const CONFIG_ENV_VAR: &str =
  "TASKGRID_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "TASKGRID_TIMEZONE";

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Config {
  pub timezone:     Option<String>,
  pub color:        bool,
  pub calendar:     CalendarConfig,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>,
  #[serde(skip)]
  zone:             Option<Tz>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct CalendarConfig {
  pub default_view: String,
  pub hour_start:   u32,
  pub hour_end:     u32
}

fn calendar_default_view() -> String {
  ViewMode::Week.as_key().to_string()
}

fn calendar_default_hour_start() -> u32
{
  8
}

fn calendar_default_hour_end() -> u32 {
  20
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timezone:     None,
      color:        true,
      calendar:     CalendarConfig::default(
      ),
      loaded_files: vec![],
      zone:         None
    }
  }
}

impl Default for CalendarConfig {
  fn default() -> Self {
    Self {
      default_view:
        calendar_default_view(),
      hour_start:
        calendar_default_hour_start(),
      hour_end:
        calendar_default_hour_end()
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::read_or_default(
      resolve_config_path(config_override),
      config_override.is_some()
    )?;

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && !raw.trim().is_empty()
    {
      debug!(timezone = %raw, "timezone taken from environment");
      cfg.timezone = Some(raw);
    }

    cfg.sanitize();
    Ok(cfg)
  }

  fn read_or_default(
    path: Option<PathBuf>,
    explicit: bool
  ) -> anyhow::Result<Self> {
    match path {
      | Some(path) if path.exists() => {
        info!(config = %path.display(), "loading config");
        let raw =
          fs::read_to_string(&path)
            .with_context(|| {
              format!(
                "failed to read {}",
                path.display()
              )
            })?;
        let mut cfg = parse_toml(&raw)
          .with_context(|| {
            format!(
              "failed to parse {}",
              path.display()
            )
          })?;
        cfg.loaded_files.push(path);
        Ok(cfg)
      }
      | Some(path) if explicit => {
        Err(anyhow!(
          "config file does not \
           exist: {}",
          path.display()
        ))
      }
      | Some(path) => {
        debug!(
          config = %path.display(),
          "no config file; using defaults"
        );
        Ok(Self::default())
      }
      | None => {
        debug!(
          "no config directory; using \
           defaults"
        );
        Ok(Self::default())
      }
    }
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut cfg = parse_toml(raw)?;
    cfg.sanitize();
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k.trim();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");
      match key {
        | "timezone" => {
          self.timezone =
            Some(value.to_string());
        }
        | "color" => {
          self.color = parse_bool(value);
        }
        | "calendar.default_view" => {
          self.calendar.default_view =
            value.to_string();
        }
        | "calendar.hour_start" => {
          self.calendar.hour_start =
            parse_hour(key, value)?;
        }
        | "calendar.hour_end" => {
          self.calendar.hour_end =
            parse_hour(key, value)?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: \
             {other}"
          ));
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  /// Zone resolved by the last
  /// sanitize pass; UTC when unset or
  /// invalid.
  pub fn timezone(&self) -> Tz {
    self.zone.unwrap_or(chrono_tz::UTC)
  }

  pub fn default_view(&self) -> ViewMode {
    ViewMode::from_key(
      &self.calendar.default_view
    )
    .unwrap_or(ViewMode::Week)
  }

  fn sanitize(&mut self) {
    if ViewMode::from_key(
      &self.calendar.default_view
    )
    .is_none()
    {
      warn!(
        view = %self.calendar.default_view,
        "unknown default view; using week"
      );
      self.calendar.default_view =
        calendar_default_view();
    }

    if self.calendar.hour_start > 23 {
      self.calendar.hour_start = 23;
    }
    if self.calendar.hour_end > 23 {
      self.calendar.hour_end = 23;
    }
    if self.calendar.hour_end
      < self.calendar.hour_start
    {
      self.calendar.hour_end =
        self.calendar.hour_start;
    }

    self.zone = self
      .timezone
      .as_deref()
      .and_then(|raw| {
        let zone =
          parse_timezone(raw, "config");
        if zone.is_none() {
          warn!(
            "falling back to UTC \
             after invalid timezone"
          );
        }
        zone
      });
  }
}

fn parse_toml(
  raw: &str
) -> anyhow::Result<Config> {
  toml::from_str(raw)
    .context("invalid config toml")
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir
      .join("taskgrid")
      .join(CONFIG_FILE_NAME)
  })
}

fn parse_hour(
  key: &str,
  value: &str
) -> anyhow::Result<u32> {
  value.parse::<u32>().with_context(
    || {
      format!(
        "{key} expects an hour \
         between 0 and 23, got \
         '{value}'"
      )
    }
  )
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
