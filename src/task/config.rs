//! Engine configuration.
//!
//! Loading the configuration from a file or environment is left to the
//! embedding application; the types deserialise from any serde format.

use crate::task::domain::{CustomHoliday, WorkingDayCalendar};
use serde::{Deserialize, Serialize};

/// Default prefix of generated external identifiers.
pub const DEFAULT_EXTERNAL_ID_PREFIX: &str = "ETI:";

/// Default prefix of generated business process identifiers.
pub const DEFAULT_BUSINESS_PROCESS_ID_PREFIX: &str = "BPI:";

/// Settings for the working-day calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingDaySettings {
    /// Treat German federal public holidays as non-working days.
    pub german_public_holidays: bool,
    /// Treat Corpus Christi as a holiday; only honoured together with
    /// `german_public_holidays`.
    pub corpus_christi: bool,
    /// Additional fixed holidays.
    pub custom_holidays: Vec<CustomHoliday>,
}

impl WorkingDaySettings {
    /// Builds the calendar described by these settings.
    #[must_use]
    pub fn calendar(&self) -> WorkingDayCalendar {
        let calendar = WorkingDayCalendar::new().with_custom_holidays(self.custom_holidays.iter().copied());
        if self.german_public_holidays {
            calendar.with_german_holidays(self.corpus_christi)
        } else {
            calendar
        }
    }
}

/// Configuration of the task lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskEngineConfig {
    /// Working-day calendar settings.
    pub working_days: WorkingDaySettings,
    /// Domain searched when a classification key is missing from the task
    /// domain.
    pub master_domain: String,
    /// Prefix of generated external identifiers.
    pub external_id_prefix: String,
    /// Prefix of generated business process identifiers.
    pub business_process_id_prefix: String,
}

impl Default for TaskEngineConfig {
    fn default() -> Self {
        Self {
            working_days: WorkingDaySettings::default(),
            master_domain: String::new(),
            external_id_prefix: DEFAULT_EXTERNAL_ID_PREFIX.to_owned(),
            business_process_id_prefix: DEFAULT_BUSINESS_PROCESS_ID_PREFIX.to_owned(),
        }
    }
}

impl TaskEngineConfig {
    /// Configuration with German public holidays, including Corpus Christi.
    #[must_use]
    pub fn german() -> Self {
        Self {
            working_days: WorkingDaySettings {
                german_public_holidays: true,
                corpus_christi: true,
                custom_holidays: Vec::new(),
            },
            ..Self::default()
        }
    }

    /// Sets the working-day settings.
    #[must_use]
    pub fn with_working_days(mut self, working_days: WorkingDaySettings) -> Self {
        self.working_days = working_days;
        self
    }

    /// Sets the classification fallback domain.
    #[must_use]
    pub fn with_master_domain(mut self, master_domain: impl Into<String>) -> Self {
        self.master_domain = master_domain.into();
        self
    }
}
